//! Invocation construction: closing generics and validating arguments.
//!
//! A surrogate holds one [`InvocationTemplate`] per intercepted member.
//! Instantiating a template closes the member's signature over the call's
//! type arguments, validates the incoming argument payloads against the
//! closed parameter types, and produces the mutable [`MemberInvocation`]
//! that travels down the interceptor chain. The dispatch state machine
//! itself lives in the `dispatch` module.

use std::fmt;
use std::sync::Arc;

use interpose_sdk::{
    AccessorKind, CallError, CallResult, CallValue, Interceptor, Invocation, InvokeArgs,
    ParamMode, TargetObject, TargetRef, TypeModel, TypeRef, TypeToken,
};

use crate::builder::{Blueprint, DispatchOrigin, InterceptedMember};
use crate::dispatch::DispatchState;
use crate::request::ProxyKind;

/// Reusable per-member dispatch recipe, shared by every call to the member.
pub(crate) struct InvocationTemplate {
    blueprint: Arc<Blueprint>,
    index: usize,
}

impl InvocationTemplate {
    pub(crate) fn new(blueprint: Arc<Blueprint>, index: usize) -> Self {
        Self { blueprint, index }
    }

    pub(crate) fn member(&self) -> &InterceptedMember {
        &self.blueprint.members[self.index]
    }

    pub(crate) fn kind(&self) -> ProxyKind {
        self.blueprint.kind
    }
}

/// A type position after generic closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClosedTy {
    /// Checked against a registered shape.
    Token(TypeToken),
    /// Opaque; payloads pass through unchecked.
    Unchecked,
    /// No value; only the unit payload is accepted.
    Void,
}

/// A member signature closed over one call's type arguments.
pub(crate) struct ClosedSig {
    pub params: Vec<(ParamMode, ClosedTy)>,
    pub ret: ClosedTy,
}

fn close_ref(
    model: &TypeModel,
    template: &InvocationTemplate,
    type_args: &[TypeToken],
    ty: TypeRef,
) -> ClosedTy {
    match ty {
        TypeRef::Concrete(token) => ClosedTy::Token(token),
        TypeRef::Void => ClosedTy::Void,
        TypeRef::MethodParam(position) => match type_args.get(position as usize) {
            Some(token) => ClosedTy::Token(*token),
            None => ClosedTy::Unchecked,
        },
        TypeRef::ClassParam(position) => {
            // Resolved through the declaring shape's instantiation, falling
            // back to the proxied type's own instantiation.
            let declaring = template.member().descriptor.declaring;
            let from_declaring = model
                .get(declaring)
                .and_then(|shape| shape.generic_origin.clone())
                .and_then(|origin| origin.args.get(position as usize).copied());
            let resolved = from_declaring.or_else(|| {
                model
                    .get(template.blueprint.target_type)
                    .and_then(|shape| shape.generic_origin.clone())
                    .and_then(|origin| origin.args.get(position as usize).copied())
            });
            match resolved {
                Some(token) => ClosedTy::Token(token),
                None => ClosedTy::Unchecked,
            }
        }
    }
}

fn expected_name(model: &TypeModel, ty: ClosedTy) -> String {
    match ty {
        ClosedTy::Token(token) => model.name_of(token),
        ClosedTy::Unchecked => "<any>".to_string(),
        ClosedTy::Void => "unit".to_string(),
    }
}

/// Whether a payload satisfies a closed type. Reference shapes without a
/// backing Rust type accept any payload.
fn value_matches(model: &TypeModel, value: &CallValue, ty: ClosedTy) -> bool {
    match ty {
        ClosedTy::Unchecked => true,
        ClosedTy::Void => value.is_unit(),
        ClosedTy::Token(token) => match model.get(token) {
            Some(shape) => match shape.value_type {
                Some(type_id) => value.type_id() == type_id,
                None => true,
            },
            None => true,
        },
    }
}

/// One in-flight intercepted call.
pub(crate) struct MemberInvocation<'a> {
    pub(crate) template: &'a InvocationTemplate,
    pub(crate) model: &'a TypeModel,
    pub(crate) chain: Arc<[Arc<dyn Interceptor>]>,
    pub(crate) position: usize,
    pub(crate) state: DispatchState,
    pub(crate) args: Vec<CallValue>,
    pub(crate) type_args: Vec<TypeToken>,
    pub(crate) closed: ClosedSig,
    pub(crate) call_target: Option<TargetRef>,
    pub(crate) redirectable: bool,
    pub(crate) return_value: Option<CallValue>,
}

impl<'a> MemberInvocation<'a> {
    /// Closes the template over this call's type arguments and validates
    /// the incoming payloads.
    pub(crate) fn instantiate(
        template: &'a InvocationTemplate,
        model: &'a TypeModel,
        chain: Arc<[Arc<dyn Interceptor>]>,
        call_target: Option<TargetRef>,
        type_args: Vec<TypeToken>,
        args: Vec<CallValue>,
    ) -> CallResult<Self> {
        let member = template.member();
        let sig = &member.descriptor.sig;

        if args.len() != sig.params.len() {
            return Err(CallError::ArgumentCount {
                member: sig.name.clone(),
                expected: sig.params.len(),
                got: args.len(),
            });
        }
        if type_args.len() != sig.type_params as usize {
            return Err(CallError::TypeArgumentCount {
                member: sig.name.clone(),
                expected: sig.type_params as usize,
                got: type_args.len(),
            });
        }

        let closed = ClosedSig {
            params: sig
                .params
                .iter()
                .map(|param| (param.mode, close_ref(model, template, &type_args, param.ty)))
                .collect(),
            ret: close_ref(model, template, &type_args, sig.ret),
        };

        // Out slots carry placeholders on the way in; everything else is
        // checked against the closed parameter type.
        for (index, (arg, (mode, ty))) in args.iter().zip(&closed.params).enumerate() {
            if *mode == ParamMode::Out {
                continue;
            }
            if !value_matches(model, arg, *ty) {
                return Err(CallError::ArgumentType {
                    member: sig.name.clone(),
                    index,
                    expected: expected_name(model, *ty),
                    got: arg.type_name().to_string(),
                });
            }
        }

        // Class proxies with a target forward through fixed virtual
        // dispatch; everything else can be pointed at another target for
        // the duration of one call.
        let redirectable = !(template.kind() == ProxyKind::ClassWithTarget
            && member.origin == DispatchOrigin::Target);

        Ok(Self {
            template,
            model,
            chain,
            position: 0,
            state: DispatchState::Entered,
            args,
            type_args,
            closed,
            call_target,
            redirectable,
            return_value: None,
        })
    }

    /// Runs the bound implementation on the current call target.
    ///
    /// Reaching this with no target, or with a target whose binding cannot
    /// be found or is not virtually reachable, is the no-target failure.
    pub(crate) fn invoke_on_target(&mut self) -> CallResult<()> {
        let member = self.template.member();
        let name = || member.descriptor.sig.name.clone();

        let target = self.call_target.clone().ok_or_else(|| CallError::NoTarget {
            member: name(),
        })?;
        let resolved = self
            .model
            .resolve_invoker(target.type_token, &member.descriptor.key())
            .ok_or_else(|| CallError::NoTarget { member: name() })?;
        if resolved.binding.explicit_only
            && self.template.kind() == ProxyKind::ClassWithTarget
            && member.origin == DispatchOrigin::Target
        {
            return Err(CallError::NoTarget { member: name() });
        }

        let produced = (resolved.binding.invoker)(
            target.instance.as_ref(),
            InvokeArgs {
                args: &mut self.args,
                type_args: &self.type_args,
            },
        )?;

        // Write-backs must still satisfy the closed signature.
        for (index, (mode, ty)) in self.closed.params.iter().enumerate() {
            if !matches!(mode, ParamMode::ByRef | ParamMode::Out) {
                continue;
            }
            let slot = &self.args[index];
            if !value_matches(self.model, slot, *ty) {
                return Err(CallError::ArgumentType {
                    member: name(),
                    index,
                    expected: expected_name(self.model, *ty),
                    got: slot.type_name().to_string(),
                });
            }
        }

        self.return_value = Some(produced);
        Ok(())
    }

    /// Checks the final return value against the closed return type. A
    /// missing value is acceptable only for void and unchecked returns.
    pub(crate) fn validate_return(&self) -> CallResult<()> {
        let member = self.template.member();
        match &self.return_value {
            Some(value) => {
                if !value_matches(self.model, value, self.closed.ret) {
                    return Err(CallError::ReturnType {
                        member: member.descriptor.sig.name.clone(),
                        expected: expected_name(self.model, self.closed.ret),
                        got: value.type_name().to_string(),
                    });
                }
                Ok(())
            }
            None => match self.closed.ret {
                ClosedTy::Void | ClosedTy::Unchecked => Ok(()),
                ClosedTy::Token(token) => Err(CallError::ReturnType {
                    member: member.descriptor.sig.name.clone(),
                    expected: self.model.name_of(token),
                    got: "()".to_string(),
                }),
            },
        }
    }
}

impl fmt::Debug for MemberInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInvocation")
            .field("position", &self.position)
            .field("state", &self.state)
            .field("args", &self.args)
            .field("type_args", &self.type_args)
            .field("call_target", &self.call_target)
            .field("redirectable", &self.redirectable)
            .field("return_value", &self.return_value)
            .finish_non_exhaustive()
    }
}

impl Invocation for MemberInvocation<'_> {
    fn member_name(&self) -> &str {
        &self.template.member().descriptor.sig.name
    }

    fn declaring_type(&self) -> TypeToken {
        self.template.member().descriptor.declaring
    }

    fn accessor_kind(&self) -> AccessorKind {
        self.template.member().descriptor.accessor
    }

    fn type_args(&self) -> &[TypeToken] {
        &self.type_args
    }

    fn args(&self) -> &[CallValue] {
        &self.args
    }

    fn arg(&self, index: usize) -> Option<&CallValue> {
        self.args.get(index)
    }

    fn arg_mut(&mut self, index: usize) -> Option<&mut CallValue> {
        self.args.get_mut(index)
    }

    fn set_arg(&mut self, index: usize, value: CallValue) -> CallResult<()> {
        let count = self.args.len();
        match self.args.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CallError::ArgumentIndex {
                member: self.member_name().to_string(),
                index,
                count,
            }),
        }
    }

    fn proceed(&mut self) -> CallResult<()> {
        self.step()
    }

    fn return_value(&self) -> Option<&CallValue> {
        self.return_value.as_ref()
    }

    fn set_return_value(&mut self, value: CallValue) {
        self.return_value = Some(value);
    }

    fn take_return_value(&mut self) -> Option<CallValue> {
        self.return_value.take()
    }

    fn target_type(&self) -> Option<TypeToken> {
        self.call_target.as_ref().map(|target| target.type_token)
    }

    fn can_redirect(&self) -> bool {
        self.redirectable
    }

    fn redirect_target(&mut self, target: TargetObject, target_type: TypeToken) -> CallResult<()> {
        if !self.redirectable {
            return Err(CallError::RedirectUnsupported {
                member: self.member_name().to_string(),
            });
        }
        let declaring = self.template.member().descriptor.declaring;
        if !self.model.is_subtype(target_type, declaring) {
            return Err(CallError::RedirectTargetInvalid {
                member: self.member_name().to_string(),
                expected: self.model.name_of(declaring),
            });
        }
        self.call_target = Some(TargetRef::from_shared(target, target_type));
        Ok(())
    }
}
