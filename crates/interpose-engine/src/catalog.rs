//! The signature catalog: which members a blueprint intercepts.
//!
//! For a given request the catalog walks the proxied scope (class chain or
//! interface closure, plus grafted and mixin interfaces), applies the
//! structural exclusion rules, consults the selection hook for everything
//! that survives, and folds structurally identical signatures into one
//! logical member. The resulting list drives blueprint synthesis and its
//! order is deterministic for a given model and request.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use interpose_sdk::{
    MemberDescriptor, SigKey, TypeKind, TypeModel, TypeShape, TypeToken, Visibility,
};

use crate::error::{GenerationError, GenerationResult};
use crate::request::{ProxyKind, ProxyRequest};

/// Looks up a shape, mapping a stale token to a generation error.
pub(crate) fn expect_shape(
    model: &TypeModel,
    token: TypeToken,
) -> GenerationResult<Arc<TypeShape>> {
    model.get(token).ok_or(GenerationError::UnknownType {
        index: token.index(),
    })
}

/// Collects the deduplicated, hook-filtered member list for a request.
///
/// Exclusions are applied in a fixed order: root-declared members, statics,
/// private members, internals not opened to the engine, and finally class
/// members closed to overriding. Only the last category notifies the hook;
/// the others are structural and silent. The hook's `selection_completed`
/// fires exactly once per invocation of this function.
pub(crate) fn collect_members(
    model: &TypeModel,
    request: &ProxyRequest,
) -> GenerationResult<Vec<MemberDescriptor>> {
    let hook = &request.options.hook;
    let root = model.root();

    let mut selected: Vec<MemberDescriptor> = Vec::new();
    let mut seen: FxHashSet<SigKey> = FxHashSet::default();

    for token in scope_tokens(model, request) {
        let shape = expect_shape(model, token)?;
        for member in &shape.members {
            if Some(member.declaring) == root {
                continue;
            }
            if member.flags.is_static {
                continue;
            }
            if member.flags.visibility == Visibility::Private {
                continue;
            }
            if member.flags.visibility == Visibility::Internal && !member.flags.engine_visible {
                continue;
            }
            if shape.kind == TypeKind::Class && (!member.flags.is_virtual || member.flags.is_final)
            {
                hook.notify_non_overridable(&shape, member);
                continue;
            }
            if !hook.should_intercept(&shape, member) {
                continue;
            }
            if seen.insert(member.key()) {
                selected.push(member.clone());
            }
        }
    }

    hook.selection_completed();
    tracing::debug!(
        target_type = %model.name_of(request.target_type),
        members = selected.len(),
        "member catalog assembled"
    );
    Ok(selected)
}

/// Shapes whose members are in scope for the request, in walk order.
///
/// Classes contribute their chain from most derived to root, so overrides
/// shadow their bases during dedup. Interfaces contribute their transitive
/// closure. Grafted interfaces follow the primary surface, mixin interfaces
/// come last.
fn scope_tokens(model: &TypeModel, request: &ProxyRequest) -> Vec<TypeToken> {
    let mut order: Vec<TypeToken> = Vec::new();
    let mut seen: FxHashSet<TypeToken> = FxHashSet::default();
    let mut push_all = |tokens: Vec<TypeToken>, order: &mut Vec<TypeToken>| {
        for token in tokens {
            if seen.insert(token) {
                order.push(token);
            }
        }
    };

    match request.kind {
        ProxyKind::ClassWithTarget => {
            push_all(model.hierarchy(request.target_type), &mut order);
        }
        ProxyKind::InterfaceWithTarget | ProxyKind::InterfaceWithoutTarget => {
            push_all(model.interface_closure(&[request.target_type]), &mut order);
        }
    }
    push_all(
        model.interface_closure(&request.additional_interfaces),
        &mut order,
    );
    let mixin_interfaces: Vec<TypeToken> = request
        .options
        .mixins
        .iter()
        .map(|mixin| mixin.interface)
        .collect();
    push_all(model.interface_closure(&mixin_interfaces), &mut order);
    order
}
