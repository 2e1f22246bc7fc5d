//! Type-erased argument and return values.
//!
//! Every value crossing an interception boundary travels as a [`CallValue`]:
//! a boxed `Any` payload plus enough metadata to report mismatches without
//! downcasting. Interceptors read arguments, replace them, and produce return
//! values entirely through this wrapper, so the dispatch machinery never has
//! to know the concrete Rust types involved.

use std::any::{Any, TypeId};
use std::fmt;

/// A single argument or return value, erased to `dyn Any`.
///
/// The payload must be `Send` so invocations can cross thread boundaries.
/// Alongside the payload we keep the payload's [`TypeId`], its type name for
/// diagnostics, and a monomorphized debug formatter so `CallValue` itself
/// can implement [`fmt::Debug`] without knowing the payload type.
pub struct CallValue {
    payload: Box<dyn Any + Send>,
    type_id: TypeId,
    type_name: &'static str,
    debug_fn: fn(&(dyn Any + Send)) -> String,
}

impl CallValue {
    /// Wraps an arbitrary debuggable value.
    pub fn new<T: Any + Send + fmt::Debug>(value: T) -> Self {
        Self {
            payload: Box::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            debug_fn: |any| match any.downcast_ref::<T>() {
                Some(v) => format!("{v:?}"),
                None => "<corrupt>".to_string(),
            },
        }
    }

    /// The unit value, used for `Void` returns and `Out` placeholders.
    pub fn unit() -> Self {
        Self::new(())
    }

    /// Wraps a boolean.
    pub fn bool(value: bool) -> Self {
        Self::new(value)
    }

    /// Wraps a signed integer. Integral engine values are always `i64`.
    pub fn int(value: i64) -> Self {
        Self::new(value)
    }

    /// Wraps a float. Floating-point engine values are always `f64`.
    pub fn float(value: f64) -> Self {
        Self::new(value)
    }

    /// Wraps an owned string.
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value.into())
    }

    /// `TypeId` of the erased payload.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the erased payload, for error messages.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True when the payload is `()`.
    pub fn is_unit(&self) -> bool {
        self.type_id == TypeId::of::<()>()
    }

    /// True when the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Borrows the payload as a `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Mutably borrows the payload as a `T`, if it is one.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.downcast_mut::<T>()
    }

    /// Consumes the wrapper and recovers the payload.
    ///
    /// On a type mismatch the original value is handed back so the caller
    /// can still report or reuse it.
    pub fn take<T: Any>(self) -> Result<T, CallValue> {
        if self.is::<T>() {
            match self.payload.downcast::<T>() {
                Ok(boxed) => Ok(*boxed),
                Err(_) => unreachable!("TypeId matched but downcast failed"),
            }
        } else {
            Err(self)
        }
    }

    /// Extracts a boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        self.downcast_ref::<bool>().copied()
    }

    /// Extracts an integer payload.
    pub fn as_i64(&self) -> Option<i64> {
        self.downcast_ref::<i64>().copied()
    }

    /// Extracts a float payload.
    pub fn as_f64(&self) -> Option<f64> {
        self.downcast_ref::<f64>().copied()
    }

    /// Borrows a string payload.
    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }
}

impl fmt::Debug for CallValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallValue")
            .field("type", &self.type_name)
            .field("value", &(self.debug_fn)(self.payload.as_ref()))
            .finish()
    }
}

impl From<bool> for CallValue {
    fn from(value: bool) -> Self {
        Self::bool(value)
    }
}

impl From<i64> for CallValue {
    fn from(value: i64) -> Self {
        Self::int(value)
    }
}

impl From<f64> for CallValue {
    fn from(value: f64) -> Self {
        Self::float(value)
    }
}

impl From<&str> for CallValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for CallValue {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<()> for CallValue {
    fn from(_: ()) -> Self {
        Self::unit()
    }
}
