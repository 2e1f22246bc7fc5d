//! The proxy blueprint: an immutable, cache-shareable dispatch plan.
//!
//! A blueprint records everything structural about one synthesized proxy
//! shape: the intercepted members with their dispatch origins, regrouped
//! properties and events, the mixin slot table, replicated metadata, and
//! whether surrogates built from it can be reconstructed after
//! externalization. Blueprints carry no per-instance state; surrogates add
//! the target, mixin instances, and interceptor chain on top.

use rustc_hash::FxHashMap;

use interpose_sdk::{AccessorKind, AttributeData, CallError, CallResult, MemberDescriptor, TypeToken};

use crate::request::ProxyKind;

/// Where calls to a member are forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOrigin {
    /// The surrogate's primary target.
    Target,
    /// The mixin instance registered for this interface.
    Mixin(TypeToken),
}

/// One intercepted member inside a blueprint.
#[derive(Debug, Clone)]
pub struct InterceptedMember {
    /// Position in [`Blueprint::members`]. Stable for the blueprint's life.
    pub index: usize,
    /// The member as selected by the catalog.
    pub descriptor: MemberDescriptor,
    /// Dispatch origin for the member.
    pub origin: DispatchOrigin,
    /// Metadata replicated from the original member, best effort.
    pub replicated: Vec<AttributeData>,
}

/// A property reassembled from its accessor members.
#[derive(Debug, Clone)]
pub struct PropertyGroup {
    /// Property name.
    pub name: String,
    /// Member index of the getter, if readable.
    pub getter: Option<usize>,
    /// Member index of the setter, if writable.
    pub setter: Option<usize>,
}

/// An event reassembled from its accessor members.
#[derive(Debug, Clone)]
pub struct EventGroup {
    /// Event name.
    pub name: String,
    /// Member index of the subscription accessor.
    pub add: Option<usize>,
    /// Member index of the unsubscription accessor.
    pub remove: Option<usize>,
}

/// What a surrogate needs to be rebuilt after externalization.
#[derive(Debug, Clone)]
pub struct ReconstructionInfo {
    /// Whether target state is captured through the shape's codec. False
    /// means the surrogate is targetless and rebuilds without state.
    pub delegate_to_base: bool,
}

/// The synthesized dispatch plan for one structural cache key.
#[derive(Debug)]
pub struct Blueprint {
    /// Proxying mode the blueprint was synthesized for.
    pub kind: ProxyKind,
    /// The proxied class or primary interface.
    pub target_type: TypeToken,
    /// Grafted interfaces, in request order.
    pub additional_interfaces: Vec<TypeToken>,
    /// Intercepted members, in catalog order.
    pub members: Vec<InterceptedMember>,
    /// Properties regrouped from accessor members.
    pub properties: Vec<PropertyGroup>,
    /// Events regrouped from accessor members.
    pub events: Vec<EventGroup>,
    /// Mixin slot table: slot index to contributed interface.
    pub mixin_slots: Vec<TypeToken>,
    /// Type-level metadata replicated from the proxied type, best effort.
    pub type_attributes: Vec<AttributeData>,
    /// Present when surrogates over this blueprint can be externalized.
    pub reconstruction: Option<ReconstructionInfo>,
    pub(crate) by_name: FxHashMap<String, Vec<usize>>,
    pub(crate) mixin_index: FxHashMap<TypeToken, usize>,
}

impl Blueprint {
    /// Resolves a member by name and argument count.
    ///
    /// Exactly one candidate must match; none is a missing member, several
    /// are ambiguous.
    pub fn find_member(&self, name: &str, argc: usize) -> CallResult<&InterceptedMember> {
        let candidates = self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[]);
        let mut matching = candidates
            .iter()
            .map(|&index| &self.members[index])
            .filter(|member| member.descriptor.sig.arity() == argc);

        let Some(first) = matching.next() else {
            return Err(CallError::MissingMember {
                name: name.to_string(),
                argc,
            });
        };
        if matching.next().is_some() {
            return Err(CallError::AmbiguousMember {
                name: name.to_string(),
                argc,
            });
        }
        Ok(first)
    }

    /// Looks up a regrouped property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyGroup> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Looks up a regrouped event by name.
    pub fn event(&self, name: &str) -> Option<&EventGroup> {
        self.events.iter().find(|event| event.name == name)
    }

    /// Slot index for a mixin interface, if the blueprint carries it.
    pub fn mixin_slot(&self, interface: TypeToken) -> Option<usize> {
        self.mixin_index.get(&interface).copied()
    }

    /// Number of intercepted members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Members playing the given accessor role.
    pub fn members_with_kind(
        &self,
        kind: AccessorKind,
    ) -> impl Iterator<Item = &InterceptedMember> {
        self.members
            .iter()
            .filter(move |member| member.descriptor.accessor == kind)
    }
}
