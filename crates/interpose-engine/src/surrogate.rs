//! Surrogates: live proxy instances over a shared blueprint.
//!
//! A surrogate pairs one cached [`Blueprint`] with per-instance wiring: the
//! primary target, the filled mixin slots, and the interceptor chain. Every
//! call entry point funnels through the same member resolution and dispatch
//! path, so methods, properties, and events all behave identically under
//! interception.

use std::fmt;
use std::sync::Arc;

use interpose_sdk::{
    CallError, CallResult, CallValue, Interceptor, Invocation, TargetRef, TypeModel, TypeToken,
};

use crate::builder::Blueprint;
use crate::error::GenerationResult;
use crate::invocation::{InvocationTemplate, MemberInvocation};
use crate::mixin::{self, MixinTable};
use crate::request::{MixinEntry, ProxyKind};

/// A proxy instance: target, mixins, and interceptors over a blueprint.
///
/// Surrogates are `Send + Sync`; calls may arrive from any thread and each
/// call gets its own invocation state.
pub struct Surrogate {
    blueprint: Arc<Blueprint>,
    model: Arc<TypeModel>,
    chain: Arc<[Arc<dyn Interceptor>]>,
    target: Option<TargetRef>,
    mixins: MixinTable,
    templates: Vec<InvocationTemplate>,
}

impl Surrogate {
    /// Wires a blueprint to its per-instance state.
    pub(crate) fn assemble(
        model: Arc<TypeModel>,
        blueprint: Arc<Blueprint>,
        target: Option<TargetRef>,
        interceptors: Vec<Arc<dyn Interceptor>>,
        mixin_entries: &[MixinEntry],
    ) -> GenerationResult<Self> {
        let mixins = MixinTable::from_entries(&model, &blueprint, mixin_entries)?;
        let templates = (0..blueprint.members.len())
            .map(|index| InvocationTemplate::new(Arc::clone(&blueprint), index))
            .collect();
        Ok(Self {
            blueprint,
            model,
            chain: Arc::from(interceptors),
            target,
            mixins,
            templates,
        })
    }

    /// Invokes a member by name with positional arguments.
    pub fn invoke(&self, member: &str, args: Vec<CallValue>) -> CallResult<CallValue> {
        self.invoke_with_type_args(member, Vec::new(), args)
    }

    /// Invokes a generic member, closing it over `type_args` for this call.
    pub fn invoke_with_type_args(
        &self,
        member: &str,
        type_args: Vec<TypeToken>,
        args: Vec<CallValue>,
    ) -> CallResult<CallValue> {
        let index = self.blueprint.find_member(member, args.len())?.index;
        self.invoke_member(index, type_args, args)
    }

    /// Reads an intercepted property.
    pub fn get(&self, property: &str) -> CallResult<CallValue> {
        let group = self
            .blueprint
            .property(property)
            .ok_or_else(|| CallError::MissingProperty {
                name: property.to_string(),
            })?;
        let getter = group.getter.ok_or_else(|| CallError::PropertyNotReadable {
            name: property.to_string(),
        })?;
        self.invoke_member(getter, Vec::new(), Vec::new())
    }

    /// Writes an intercepted property.
    pub fn set(&self, property: &str, value: CallValue) -> CallResult<()> {
        let group = self
            .blueprint
            .property(property)
            .ok_or_else(|| CallError::MissingProperty {
                name: property.to_string(),
            })?;
        let setter = group.setter.ok_or_else(|| CallError::PropertyNotWritable {
            name: property.to_string(),
        })?;
        self.invoke_member(setter, Vec::new(), vec![value])?;
        Ok(())
    }

    /// Subscribes a handler to an intercepted event.
    pub fn add_handler(&self, event: &str, handler: CallValue) -> CallResult<()> {
        let group = self
            .blueprint
            .event(event)
            .ok_or_else(|| CallError::MissingEvent {
                name: event.to_string(),
            })?;
        let add = group.add.ok_or_else(|| CallError::MissingEvent {
            name: event.to_string(),
        })?;
        self.invoke_member(add, Vec::new(), vec![handler])?;
        Ok(())
    }

    /// Unsubscribes a handler from an intercepted event.
    pub fn remove_handler(&self, event: &str, handler: CallValue) -> CallResult<()> {
        let group = self
            .blueprint
            .event(event)
            .ok_or_else(|| CallError::MissingEvent {
                name: event.to_string(),
            })?;
        let remove = group.remove.ok_or_else(|| CallError::MissingEvent {
            name: event.to_string(),
        })?;
        self.invoke_member(remove, Vec::new(), vec![handler])?;
        Ok(())
    }

    fn invoke_member(
        &self,
        index: usize,
        type_args: Vec<TypeToken>,
        args: Vec<CallValue>,
    ) -> CallResult<CallValue> {
        let template = &self.templates[index];
        let target = mixin::resolve_call_target(
            &self.blueprint,
            &self.mixins,
            self.target.as_ref(),
            template.member().origin,
        );

        let mut invocation = MemberInvocation::instantiate(
            template,
            &self.model,
            Arc::clone(&self.chain),
            target,
            type_args,
            args,
        )?;
        invocation.dispatch()?;
        Ok(invocation.take_return_value().unwrap_or_else(CallValue::unit))
    }

    /// The shared dispatch plan this surrogate runs on.
    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    /// Proxying mode.
    pub fn kind(&self) -> ProxyKind {
        self.blueprint.kind
    }

    /// The primary target, if this surrogate carries one.
    pub fn target(&self) -> Option<&TargetRef> {
        self.target.as_ref()
    }

    /// Number of interceptors in the chain.
    pub fn interceptor_count(&self) -> usize {
        self.chain.len()
    }

    /// Whether the surrogate's surface satisfies `interface`, through the
    /// proxied type, a grafted interface, or a mixin.
    pub fn implements(&self, interface: TypeToken) -> bool {
        if self.blueprint.target_type == interface
            || self.model.is_subtype(self.blueprint.target_type, interface)
        {
            return true;
        }
        let mut seeds = self.blueprint.additional_interfaces.clone();
        seeds.extend(&self.blueprint.mixin_slots);
        self.model.interface_closure(&seeds).contains(&interface)
    }

    pub(crate) fn chain(&self) -> &[Arc<dyn Interceptor>] {
        &self.chain
    }

    pub(crate) fn model(&self) -> &Arc<TypeModel> {
        &self.model
    }
}

impl fmt::Debug for Surrogate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surrogate")
            .field("kind", &self.blueprint.kind)
            .field("target_type", &self.blueprint.target_type)
            .field("members", &self.blueprint.member_count())
            .field("interceptors", &self.chain.len())
            .field("mixin_slots", &self.mixins.len())
            .finish_non_exhaustive()
    }
}
