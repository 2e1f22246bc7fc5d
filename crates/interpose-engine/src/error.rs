//! Engine-side error types for proxy generation.

use thiserror::Error;

/// Result alias for configuration and synthesis operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// A failure while validating a proxy request or synthesizing a blueprint.
///
/// These are configuration errors: they are raised before any interception
/// happens, and a failed request leaves the blueprint cache untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// A token in the request is not registered in the engine's model.
    #[error("type token #{index} is not registered in the engine's model")]
    UnknownType {
        /// Raw index of the unknown token.
        index: usize,
    },

    /// Open generic definitions cannot be proxied.
    #[error("'{name}' is an open generic definition and cannot be proxied; close it first")]
    OpenGenericTarget {
        /// Name of the open definition.
        name: String,
    },

    /// The request kind needs a class but the token is not one.
    #[error("'{name}' is not a class")]
    ClassRequired {
        /// Name of the offending type.
        name: String,
    },

    /// The request kind needs an interface but the token is not one.
    #[error("'{name}' is not an interface")]
    InterfaceRequired {
        /// Name of the offending type.
        name: String,
    },

    /// The request kind forwards to a target, but none was supplied.
    #[error("proxy kind {kind} requires a target instance")]
    TargetRequired {
        /// Display name of the request kind.
        kind: &'static str,
    },

    /// The request kind is targetless, but a target was supplied.
    #[error("proxy kind {kind} does not accept a target instance")]
    TargetNotExpected {
        /// Display name of the request kind.
        kind: &'static str,
    },

    /// The supplied target does not satisfy the proxied type.
    #[error("target of type '{target}' is not assignable to '{expected}'")]
    TargetNotAssignable {
        /// Registered type of the supplied target.
        target: String,
        /// Type the request proxies.
        expected: String,
    },

    /// The same interface is contributed twice across mixins or between a
    /// mixin and the proxied surface.
    #[error("interface '{interface}' is contributed more than once")]
    MixinConflict {
        /// The doubly contributed interface.
        interface: String,
    },

    /// A mixin instance does not implement its declared interface.
    #[error("mixin instance of type '{mixin}' does not implement '{interface}'")]
    MixinNotAssignable {
        /// Registered type of the mixin instance.
        mixin: String,
        /// Interface the mixin was registered under.
        interface: String,
    },

    /// A cached blueprint expects a mixin the request did not supply.
    #[error("no mixin instance supplied for interface '{interface}'")]
    MixinInstanceMissing {
        /// Interface whose slot is unfilled.
        interface: String,
    },

    /// A selected member cannot be reached on the target type.
    #[error("member '{member}' of '{declaring}' is not reachable on target type '{target}'")]
    MemberUnreachable {
        /// The unreachable member.
        member: String,
        /// Shape that declared it.
        declaring: String,
        /// Target type it cannot be reached on.
        target: String,
    },

    /// A class proxy without an explicit target needs a default factory.
    #[error("class '{name}' has no default factory; supply a target instance")]
    NoDefaultFactory {
        /// Class lacking a factory.
        name: String,
    },
}
