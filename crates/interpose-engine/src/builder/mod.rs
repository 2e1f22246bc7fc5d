//! Blueprint synthesis from a catalog of selected members.
//!
//! Synthesis is the expensive step the blueprint cache amortizes: origin
//! assignment, mixin conflict detection, reachability validation, accessor
//! regrouping, and metadata replication all happen here, exactly once per
//! structural cache key.

pub mod blueprint;

pub use blueprint::{
    Blueprint, DispatchOrigin, EventGroup, InterceptedMember, PropertyGroup, ReconstructionInfo,
};

use rustc_hash::FxHashMap;

use interpose_sdk::{AccessorKind, AttributeData, MemberDescriptor, TypeModel, TypeToken};

use crate::catalog::expect_shape;
use crate::error::{GenerationError, GenerationResult};
use crate::request::{ProxyKind, ProxyRequest};

/// Synthesizes a blueprint for `request` from the catalog's member list.
pub(crate) fn build(
    model: &TypeModel,
    request: &ProxyRequest,
    members: Vec<MemberDescriptor>,
) -> GenerationResult<Blueprint> {
    let target_shape = expect_shape(model, request.target_type)?;

    // Every interface reachable through the primary surface. Mixins must
    // not contribute any of these again.
    let mut primary_surface: Vec<TypeToken> = match request.kind {
        ProxyKind::ClassWithTarget => model.interfaces_of(request.target_type),
        ProxyKind::InterfaceWithTarget | ProxyKind::InterfaceWithoutTarget => {
            model.interface_closure(&[request.target_type])
        }
    };
    primary_surface.extend(model.interface_closure(&request.additional_interfaces));

    // Interface to owning mixin slot. A clash here, or with the primary
    // surface, makes dispatch ownership ambiguous and is an error.
    let mut owner: FxHashMap<TypeToken, TypeToken> = FxHashMap::default();
    let mut mixin_slots: Vec<TypeToken> = Vec::new();
    for entry in &request.options.mixins {
        mixin_slots.push(entry.interface);
        for contributed in model.interface_closure(&[entry.interface]) {
            let clashes = primary_surface.contains(&contributed)
                || owner.insert(contributed, entry.interface).is_some();
            if clashes {
                return Err(GenerationError::MixinConflict {
                    interface: model.name_of(contributed),
                });
            }
        }
    }
    let mixin_index: FxHashMap<TypeToken, usize> = mixin_slots
        .iter()
        .enumerate()
        .map(|(slot, interface)| (*interface, slot))
        .collect();

    let mut intercepted: Vec<InterceptedMember> = Vec::with_capacity(members.len());
    for (index, descriptor) in members.into_iter().enumerate() {
        let origin = match owner.get(&descriptor.declaring) {
            Some(mixin_interface) => DispatchOrigin::Mixin(*mixin_interface),
            None => DispatchOrigin::Target,
        };

        // A class proxy forwards through virtual dispatch on the declared
        // target type, so every selected class member must resolve to a
        // virtually reachable binding there. Abstract members resolve on
        // the concrete instance at call time instead.
        if request.kind == ProxyKind::ClassWithTarget
            && origin == DispatchOrigin::Target
            && !descriptor.flags.is_abstract
        {
            let reachable = model
                .resolve_invoker(request.target_type, &descriptor.key())
                .is_some_and(|resolved| !resolved.binding.explicit_only);
            if !reachable {
                return Err(GenerationError::MemberUnreachable {
                    member: descriptor.name().to_string(),
                    declaring: model.name_of(descriptor.declaring),
                    target: target_shape.name.clone(),
                });
            }
        }

        let replicated = replicate_attributes(&descriptor.attributes, descriptor.name());
        intercepted.push(InterceptedMember {
            index,
            descriptor,
            origin,
            replicated,
        });
    }

    let (properties, events) = regroup_accessors(&intercepted);

    let mut by_name: FxHashMap<String, Vec<usize>> = FxHashMap::default();
    for member in &intercepted {
        by_name
            .entry(member.descriptor.name().to_string())
            .or_default()
            .push(member.index);
    }

    let reconstruction = match request.kind {
        ProxyKind::InterfaceWithoutTarget => Some(ReconstructionInfo {
            delegate_to_base: false,
        }),
        _ if target_shape.supports_reconstruction() => Some(ReconstructionInfo {
            delegate_to_base: true,
        }),
        _ => None,
    };

    let type_attributes = replicate_attributes(&target_shape.attributes, &target_shape.name);

    Ok(Blueprint {
        kind: request.kind,
        target_type: request.target_type,
        additional_interfaces: request.additional_interfaces.clone(),
        members: intercepted,
        properties,
        events,
        mixin_slots,
        type_attributes,
        reconstruction,
        by_name,
        mixin_index,
    })
}

/// Clones replicable, non-inherited attributes. Inherited metadata flows on
/// its own; non-replicable items are logged and skipped rather than failing
/// the synthesis.
fn replicate_attributes(attributes: &[AttributeData], owner: &str) -> Vec<AttributeData> {
    let mut replicated = Vec::new();
    for attribute in attributes {
        if attribute.inherited {
            continue;
        }
        if !attribute.replicable {
            tracing::warn!(
                attribute = %attribute.name,
                owner = %owner,
                "attribute cannot be replicated onto the generated member; skipping"
            );
            continue;
        }
        replicated.push(attribute.clone());
    }
    replicated
}

/// Reassembles flat accessor members into property and event groups.
/// Grouping is per declaring shape, so a name reused across interfaces
/// yields separate groups.
fn regroup_accessors(members: &[InterceptedMember]) -> (Vec<PropertyGroup>, Vec<EventGroup>) {
    let mut properties: Vec<PropertyGroup> = Vec::new();
    let mut property_index: FxHashMap<(TypeToken, String), usize> = FxHashMap::default();
    let mut events: Vec<EventGroup> = Vec::new();
    let mut event_index: FxHashMap<(TypeToken, String), usize> = FxHashMap::default();

    for member in members {
        let Some(group) = member.descriptor.group.clone() else {
            continue;
        };
        let key = (member.descriptor.declaring, group.clone());
        match member.descriptor.accessor {
            AccessorKind::PropertyGet | AccessorKind::PropertySet => {
                let slot = *property_index.entry(key).or_insert_with(|| {
                    properties.push(PropertyGroup {
                        name: group,
                        getter: None,
                        setter: None,
                    });
                    properties.len() - 1
                });
                if member.descriptor.accessor == AccessorKind::PropertyGet {
                    properties[slot].getter = Some(member.index);
                } else {
                    properties[slot].setter = Some(member.index);
                }
            }
            AccessorKind::EventAdd | AccessorKind::EventRemove => {
                let slot = *event_index.entry(key).or_insert_with(|| {
                    events.push(EventGroup {
                        name: group,
                        add: None,
                        remove: None,
                    });
                    events.len() - 1
                });
                if member.descriptor.accessor == AccessorKind::EventAdd {
                    events[slot].add = Some(member.index);
                } else {
                    events[slot].remove = Some(member.index);
                }
            }
            AccessorKind::Method => {}
        }
    }

    (properties, events)
}
