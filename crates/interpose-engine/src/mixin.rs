//! Mixin slot wiring and call-target resolution.
//!
//! The blueprint fixes which interfaces occupy mixin slots; each surrogate
//! fills those slots with live instances from its request. Resolving the
//! target for a call is a pure function of the member's dispatch origin,
//! the filled slot table, and the surrogate's primary target.

use rustc_hash::FxHashMap;

use interpose_sdk::{TargetRef, TypeModel, TypeToken};

use crate::builder::{Blueprint, DispatchOrigin};
use crate::error::{GenerationError, GenerationResult};
use crate::request::MixinEntry;

/// Mixin instances filled into a blueprint's slots, one surrogate's worth.
#[derive(Debug)]
pub(crate) struct MixinTable {
    slots: Vec<TargetRef>,
}

impl MixinTable {
    /// Matches request entries against the blueprint's slot table.
    ///
    /// Every slot must be filled by an instance that satisfies its
    /// interface; extra entries are ignored (the blueprint, not the
    /// request, decides the slots).
    pub(crate) fn from_entries(
        model: &TypeModel,
        blueprint: &Blueprint,
        entries: &[MixinEntry],
    ) -> GenerationResult<Self> {
        let by_interface: FxHashMap<TypeToken, &MixinEntry> = entries
            .iter()
            .map(|entry| (entry.interface, entry))
            .collect();

        let mut slots = Vec::with_capacity(blueprint.mixin_slots.len());
        for interface in &blueprint.mixin_slots {
            let entry = by_interface.get(interface).ok_or_else(|| {
                GenerationError::MixinInstanceMissing {
                    interface: model.name_of(*interface),
                }
            })?;
            if !model.is_subtype(entry.instance_type, *interface) {
                return Err(GenerationError::MixinNotAssignable {
                    mixin: model.name_of(entry.instance_type),
                    interface: model.name_of(*interface),
                });
            }
            slots.push(TargetRef::from_shared(
                entry.instance.clone(),
                entry.instance_type,
            ));
        }
        Ok(Self { slots })
    }

    fn slot(&self, index: usize) -> Option<&TargetRef> {
        self.slots.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Picks the initial call target for a member: the primary target for
/// target-origin members, the owning slot instance for mixin members.
pub(crate) fn resolve_call_target(
    blueprint: &Blueprint,
    mixins: &MixinTable,
    primary: Option<&TargetRef>,
    origin: DispatchOrigin,
) -> Option<TargetRef> {
    match origin {
        DispatchOrigin::Target => primary.cloned(),
        DispatchOrigin::Mixin(interface) => blueprint
            .mixin_slot(interface)
            .and_then(|slot| mixins.slot(slot))
            .cloned(),
    }
}
