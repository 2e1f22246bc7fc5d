//! Error types shared by interceptors, invokers, and the dispatch runtime.

use thiserror::Error;

/// Result alias for everything that runs inside an invocation.
pub type CallResult<T> = Result<T, CallError>;

/// A failure raised while dispatching one intercepted call.
///
/// Everything except [`CallError::Application`] is intrinsic to the engine.
/// `Application` wraps an error produced by an interceptor or a target and
/// crosses the dispatch boundary untouched, so callers observe exactly the
/// value that was raised.
#[derive(Debug, Error)]
pub enum CallError {
    /// Dispatch reached the end of the interceptor chain with nowhere to go.
    #[error("no target to invoke for '{member}'")]
    NoTarget {
        /// Member being dispatched.
        member: String,
    },

    /// No intercepted member matches the requested name and arity.
    #[error("no intercepted member '{name}' taking {argc} argument(s)")]
    MissingMember {
        /// Requested member name.
        name: String,
        /// Number of arguments supplied.
        argc: usize,
    },

    /// More than one intercepted member matches the requested name and arity.
    #[error("member '{name}' with {argc} argument(s) is ambiguous")]
    AmbiguousMember {
        /// Requested member name.
        name: String,
        /// Number of arguments supplied.
        argc: usize,
    },

    /// No intercepted property with the requested name.
    #[error("no intercepted property '{name}'")]
    MissingProperty {
        /// Requested property name.
        name: String,
    },

    /// The property exists but has no getter.
    #[error("property '{name}' is not readable")]
    PropertyNotReadable {
        /// Property name.
        name: String,
    },

    /// The property exists but has no setter.
    #[error("property '{name}' is not writable")]
    PropertyNotWritable {
        /// Property name.
        name: String,
    },

    /// No intercepted event with the requested name.
    #[error("no intercepted event '{name}'")]
    MissingEvent {
        /// Requested event name.
        name: String,
    },

    /// Wrong number of arguments for the member.
    #[error("'{member}' expects {expected} argument(s), got {got}")]
    ArgumentCount {
        /// Member being dispatched.
        member: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },

    /// Argument index outside the declared parameter list.
    #[error("argument index {index} out of range for '{member}' ({count} parameter(s))")]
    ArgumentIndex {
        /// Member being dispatched.
        member: String,
        /// Offending index.
        index: usize,
        /// Declared parameter count.
        count: usize,
    },

    /// Wrong number of generic arguments for the member.
    #[error("'{member}' expects {expected} type argument(s), got {got}")]
    TypeArgumentCount {
        /// Member being dispatched.
        member: String,
        /// Declared generic parameter count.
        expected: usize,
        /// Supplied type argument count.
        got: usize,
    },

    /// An argument payload does not match the closed parameter type.
    #[error("argument {index} of '{member}': expected {expected}, got {got}")]
    ArgumentType {
        /// Member being dispatched.
        member: String,
        /// Offending argument index.
        index: usize,
        /// Expected type name.
        expected: String,
        /// Actual payload type name.
        got: String,
    },

    /// The produced return value does not match the closed return type.
    #[error("return value of '{member}': expected {expected}, got {got}")]
    ReturnType {
        /// Member being dispatched.
        member: String,
        /// Expected type name.
        expected: String,
        /// Actual payload type name.
        got: String,
    },

    /// The invocation does not allow swapping the call target.
    #[error("'{member}' does not support target redirection")]
    RedirectUnsupported {
        /// Member being dispatched.
        member: String,
    },

    /// A redirect target does not satisfy the member's declaring interface.
    #[error("redirect target for '{member}' must satisfy '{expected}'")]
    RedirectTargetInvalid {
        /// Member being dispatched.
        member: String,
        /// Required interface name.
        expected: String,
    },

    /// Error raised by application code, forwarded verbatim.
    #[error(transparent)]
    Application(Box<dyn std::error::Error + Send + Sync>),
}

impl CallError {
    /// Wraps an application error for transparent forwarding.
    pub fn application<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Application(Box::new(error))
    }

    /// True when this error originated in application code.
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application(_))
    }
}

/// A failure while registering shapes into a type model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Shape names must be non-empty.
    #[error("type name must not be empty")]
    EmptyTypeName,

    /// A shape with this name is already registered.
    #[error("type '{0}' is already registered")]
    DuplicateType(String),

    /// Two members on the shape share a structural signature.
    #[error("type '{type_name}' declares member '{member}' more than once")]
    DuplicateMember {
        /// Shape being registered.
        type_name: String,
        /// Offending member name.
        member: String,
    },

    /// A referenced token is not part of this model.
    #[error("type token #{0} is not registered in this model")]
    UnknownToken(usize),
}
