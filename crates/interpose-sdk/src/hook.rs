//! Selection hooks: caller-supplied policy over which members to intercept.

use crate::shape::TypeShape;
use crate::types::MemberDescriptor;

/// Policy consulted while the member catalog is assembled.
///
/// The catalog applies its structural exclusions first; the hook only ever
/// sees members that are fundamentally interceptable. Hooks also receive
/// advisory notifications for class members that cannot be intercepted
/// because they are closed to overriding.
///
/// Hook identity participates in blueprint cache keys through
/// [`fingerprint`](SelectionHook::fingerprint): two hooks with equal
/// fingerprints must select identically, and hooks with different policies
/// must report different fingerprints.
pub trait SelectionHook: Send + Sync {
    /// Whether the member should be intercepted.
    fn should_intercept(&self, declaring: &TypeShape, member: &MemberDescriptor) -> bool;

    /// Called for class members skipped because they are non-virtual or
    /// sealed. Advisory only; selection proceeds regardless.
    fn notify_non_overridable(&self, declaring: &TypeShape, member: &MemberDescriptor) {
        let _ = (declaring, member);
    }

    /// Called exactly once when selection for a blueprint finishes.
    fn selection_completed(&self) {}

    /// Stable identity of this hook's policy for cache keying.
    fn fingerprint(&self) -> u64;
}

/// The stock hook: intercept everything interceptable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllMembers;

impl SelectionHook for AllMembers {
    fn should_intercept(&self, _declaring: &TypeShape, _member: &MemberDescriptor) -> bool {
        true
    }

    fn fingerprint(&self) -> u64 {
        0
    }
}
