//! Interpose SDK - Lightweight SDK for writing interceptors and describing
//! proxyable types
//!
//! This crate provides the vocabulary shared between proxy consumers and the
//! engine:
//! - **Values**: Type-erased call values (`value` module)
//! - **Types**: Tokens, signatures, and member descriptors (`types` module)
//! - **Shapes**: Registered type shapes and invoker bindings (`shape` module)
//! - **Model**: The interned type model and structural queries (`model` module)
//! - **Contract**: The `Invocation` and `Interceptor` traits (`contract` module)
//! - **Hooks**: Member selection policy (`hook` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use interpose_sdk::{
//!     CallValue, Interceptor, Invocation, CallResult,
//!     MemberFlags, MemberSig, TypeModel, TypeShapeBuilder,
//! };
//!
//! struct Logging;
//!
//! impl Interceptor for Logging {
//!     fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()> {
//!         println!("-> {}", invocation.member_name());
//!         let result = invocation.proceed();
//!         println!("<- {}", invocation.member_name());
//!         result
//!     }
//! }
//!
//! let model = TypeModel::with_builtins();
//! let greeter = model.register(
//!     TypeShapeBuilder::interface("IGreeter")
//!         .method(MemberSig::method("greet"), MemberFlags::overridable()),
//! )?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Modules
// ============================================================================

pub mod contract;
pub mod error;
pub mod hook;
pub mod model;
pub mod shape;
pub mod types;
pub mod value;

// ============================================================================
// Re-exports
// ============================================================================

pub use contract::{Interceptor, Invocation, PersistentInterceptor};
pub use error::{CallError, CallResult, ModelError};
pub use hook::{AllMembers, SelectionHook};
pub use model::{Builtins, ResolvedBinding, TypeModel};
pub use shape::{
    GenericOrigin, InvokeArgs, MemberBinding, MemberInvoker, TargetCodec, TargetFactory,
    TargetObject, TargetRef, TypeShape, TypeShapeBuilder,
};
pub use types::{
    AccessorKind, AttributeData, MemberDescriptor, MemberFlags, MemberId, MemberSig, ParamMode,
    ParamSig, SigKey, TypeKind, TypeRef, TypeToken, Visibility,
};
pub use value::CallValue;
