//! The interception contract: what an interceptor sees and can do.

use crate::error::CallResult;
use crate::shape::TargetObject;
use crate::types::{AccessorKind, TypeToken};
use crate::value::CallValue;

/// One in-flight intercepted call, as seen from inside the chain.
///
/// An interceptor receives the invocation exclusively for the duration of
/// its `intercept` call. Calling [`proceed`](Invocation::proceed) hands
/// control to the next interceptor, or to the target once the chain is
/// exhausted. Not calling it short-circuits the call, in which case the
/// interceptor is responsible for a return value via
/// [`set_return_value`](Invocation::set_return_value).
pub trait Invocation {
    /// Name of the member being dispatched.
    fn member_name(&self) -> &str;

    /// Shape that declared the member.
    fn declaring_type(&self) -> TypeToken;

    /// Accessor role of the member.
    fn accessor_kind(&self) -> AccessorKind;

    /// Generic arguments this call was closed over.
    fn type_args(&self) -> &[TypeToken];

    /// All argument slots, in declaration order.
    fn args(&self) -> &[CallValue];

    /// Number of argument slots.
    fn arg_count(&self) -> usize {
        self.args().len()
    }

    /// Borrows one argument.
    fn arg(&self, index: usize) -> Option<&CallValue>;

    /// Mutably borrows one argument.
    fn arg_mut(&mut self, index: usize) -> Option<&mut CallValue>;

    /// Replaces one argument before the target sees it.
    fn set_arg(&mut self, index: usize, value: CallValue) -> CallResult<()>;

    /// Runs the rest of the chain and then the target.
    ///
    /// May be called again after a failure to retry the remainder of the
    /// chain; dispatch never re-enters interceptors that already ran.
    fn proceed(&mut self) -> CallResult<()>;

    /// Return value produced so far, if any.
    fn return_value(&self) -> Option<&CallValue>;

    /// Sets or replaces the return value.
    fn set_return_value(&mut self, value: CallValue);

    /// Takes the return value out of the invocation.
    fn take_return_value(&mut self) -> Option<CallValue>;

    /// Registered type of the current call target, if there is one.
    fn target_type(&self) -> Option<TypeToken>;

    /// Whether this invocation accepts a target redirect.
    fn can_redirect(&self) -> bool;

    /// Redirects the remainder of this call to another target instance.
    ///
    /// Affects only the current invocation; the surrogate keeps its
    /// original wiring for subsequent calls.
    fn redirect_target(&mut self, target: TargetObject, target_type: TypeToken) -> CallResult<()>;
}

/// A link in the interception chain.
///
/// Interceptors are shared across calls and threads, so they take `&self`
/// and keep any mutable state behind their own synchronization.
pub trait Interceptor: Send + Sync {
    /// Observes and steers one invocation.
    fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()>;

    /// Persistence handle, for interceptors that can externalize their
    /// state. The default opts out.
    fn as_persistent(&self) -> Option<&dyn PersistentInterceptor> {
        None
    }
}

/// An interceptor whose state can leave the process and come back.
///
/// `factory_key` names the factory that rebuilds the interceptor;
/// `save_state` captures whatever that factory needs.
pub trait PersistentInterceptor: Interceptor {
    /// Registered factory name used for reconstruction.
    fn factory_key(&self) -> &str;

    /// Captures the interceptor's state.
    fn save_state(&self) -> serde_json::Value;
}
