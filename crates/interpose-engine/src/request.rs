//! Proxy requests: what to proxy, in which mode, with which policy.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use interpose_sdk::{AllMembers, SelectionHook, TargetObject, TypeToken};

/// The three supported proxying modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyKind {
    /// Augment a class instance; calls forward to it through virtual
    /// dispatch.
    ClassWithTarget,
    /// Stand in for an interface, forwarding to a backing implementation.
    InterfaceWithTarget,
    /// Stand in for an interface with no backing implementation at all.
    InterfaceWithoutTarget,
}

impl ProxyKind {
    /// Display name used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ProxyKind::ClassWithTarget => "ClassWithTarget",
            ProxyKind::InterfaceWithTarget => "InterfaceWithTarget",
            ProxyKind::InterfaceWithoutTarget => "InterfaceWithoutTarget",
        }
    }

    /// Whether surrogates of this kind carry a backing target.
    pub fn has_target(self) -> bool {
        !matches!(self, ProxyKind::InterfaceWithoutTarget)
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mixin contribution: an interface plus the instance that fulfills it.
#[derive(Clone)]
pub struct MixinEntry {
    /// Interface the mixin contributes to the surrogate's surface.
    pub interface: TypeToken,
    /// Instance that receives calls for that interface.
    pub instance: TargetObject,
    /// Registered concrete type of the instance.
    pub instance_type: TypeToken,
}

impl MixinEntry {
    /// Pairs an interface with its backing instance.
    pub fn new(interface: TypeToken, instance: TargetObject, instance_type: TypeToken) -> Self {
        Self {
            interface,
            instance,
            instance_type,
        }
    }
}

impl fmt::Debug for MixinEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixinEntry")
            .field("interface", &self.interface)
            .field("instance_type", &self.instance_type)
            .finish_non_exhaustive()
    }
}

/// Per-request generation policy: selection hook and mixins.
///
/// Only the structural part of the options participates in blueprint cache
/// keys: the hook's fingerprint and the set of mixin interfaces. Mixin
/// instances are wiring, applied per surrogate.
#[derive(Clone)]
pub struct GenerationOptions {
    /// Member selection policy.
    pub hook: Arc<dyn SelectionHook>,
    /// Mixin contributions, in registration order.
    pub mixins: Vec<MixinEntry>,
}

impl GenerationOptions {
    /// Options with the stock all-members hook and no mixins.
    pub fn new() -> Self {
        Self {
            hook: Arc::new(AllMembers),
            mixins: Vec::new(),
        }
    }

    /// Replaces the selection hook.
    pub fn with_hook(mut self, hook: Arc<dyn SelectionHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Adds a mixin contribution.
    pub fn add_mixin(mut self, mixin: MixinEntry) -> Self {
        self.mixins.push(mixin);
        self
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GenerationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationOptions")
            .field("hook_fingerprint", &self.hook.fingerprint())
            .field("mixins", &self.mixins)
            .finish()
    }
}

/// A complete description of one requested surrogate.
///
/// Requests are consumed by
/// [`ProxyEngine::create_proxy`](crate::engine::ProxyEngine::create_proxy)
/// and are never mutated afterwards; everything cache-relevant about them is
/// captured in the structural cache key.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Proxying mode.
    pub kind: ProxyKind,
    /// The class or primary interface being proxied.
    pub target_type: TypeToken,
    /// Extra interfaces grafted onto the surrogate's surface.
    pub additional_interfaces: Vec<TypeToken>,
    /// Generation policy.
    pub options: GenerationOptions,
}

impl ProxyRequest {
    /// Request for a class proxy around a target instance.
    pub fn class_with_target(class: TypeToken) -> Self {
        Self::new(ProxyKind::ClassWithTarget, class)
    }

    /// Request for an interface proxy forwarding to a target.
    pub fn interface_with_target(interface: TypeToken) -> Self {
        Self::new(ProxyKind::InterfaceWithTarget, interface)
    }

    /// Request for a targetless interface proxy.
    pub fn interface_without_target(interface: TypeToken) -> Self {
        Self::new(ProxyKind::InterfaceWithoutTarget, interface)
    }

    fn new(kind: ProxyKind, target_type: TypeToken) -> Self {
        Self {
            kind,
            target_type,
            additional_interfaces: Vec::new(),
            options: GenerationOptions::new(),
        }
    }

    /// Grafts an extra interface onto the surrogate.
    pub fn with_interface(mut self, interface: TypeToken) -> Self {
        self.additional_interfaces.push(interface);
        self
    }

    /// Replaces the generation options.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_target_expectations() {
        assert!(ProxyKind::ClassWithTarget.has_target());
        assert!(ProxyKind::InterfaceWithTarget.has_target());
        assert!(!ProxyKind::InterfaceWithoutTarget.has_target());
    }

    #[test]
    fn test_request_builders() {
        let model = interpose_sdk::TypeModel::new();
        let iface = model
            .register(interpose_sdk::TypeShapeBuilder::interface("IThing"))
            .unwrap();

        let request = ProxyRequest::interface_with_target(iface).with_interface(iface);
        assert_eq!(request.kind, ProxyKind::InterfaceWithTarget);
        assert_eq!(request.additional_interfaces, vec![iface]);
        assert_eq!(request.options.hook.fingerprint(), 0);
    }
}
