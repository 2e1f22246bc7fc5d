//! The dispatch state machine driving one invocation through its chain.
//!
//! Dispatch is re-entrant downward only: every `proceed` moves the position
//! monotonically toward the target, so an interceptor that catches a
//! failure and proceeds again resumes from where the chain stopped rather
//! than re-entering interceptors that already ran. Proceeding past the end
//! of the chain re-invokes the target.

use std::sync::Arc;

use interpose_sdk::CallResult;

use crate::invocation::MemberInvocation;

/// Where an invocation currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchState {
    /// Created, nothing has run yet.
    Entered,
    /// Inside the interceptor at this chain position.
    Chaining(usize),
    /// Executing the target's bound implementation.
    InvokingTarget,
    /// Finished successfully.
    Returned,
    /// Finished with an error.
    Faulted,
}

impl MemberInvocation<'_> {
    /// Advances one step: enters the next interceptor, or invokes the
    /// target once the chain is exhausted.
    pub(crate) fn step(&mut self) -> CallResult<()> {
        let position = self.position;
        if position < self.chain.len() {
            self.position = position + 1;
            self.state = DispatchState::Chaining(position);
            // The interceptor is cloned out of the chain so it can receive
            // the invocation mutably.
            let interceptor = Arc::clone(&self.chain[position]);
            interceptor.intercept(self)
        } else {
            self.state = DispatchState::InvokingTarget;
            self.invoke_on_target()
        }
    }

    /// Runs the invocation to completion and settles its final state.
    ///
    /// An invocation that comes back without a return value is fine for
    /// void members; typed members fail the final return check, so a chain
    /// that neither proceeds nor produces a value cannot silently yield a
    /// default.
    pub(crate) fn dispatch(&mut self) -> CallResult<()> {
        let result = self.step().and_then(|()| self.validate_return());
        self.state = match result {
            Ok(()) => DispatchState::Returned,
            Err(_) => DispatchState::Faulted,
        };
        result
    }
}
