//! Registered type shapes and their callable bindings.
//!
//! A [`TypeShape`] is the unit of registration: the structural description of
//! one class, interface, or primitive, together with the closures that make
//! its members callable on a live target. Shapes are assembled with
//! [`TypeShapeBuilder`] and interned into a
//! [`TypeModel`](crate::model::TypeModel), which assigns the token.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::CallResult;
use crate::types::{
    AccessorKind, AttributeData, MemberDescriptor, MemberFlags, MemberSig, ParamMode, SigKey,
    TypeKind, TypeRef, TypeToken,
};
use crate::value::CallValue;

/// Shared handle to a live target object.
pub type TargetObject = Arc<dyn Any + Send + Sync>;

/// A target object paired with its registered type.
#[derive(Clone)]
pub struct TargetRef {
    /// The erased instance.
    pub instance: TargetObject,
    /// Token of the instance's registered concrete type.
    pub type_token: TypeToken,
}

impl TargetRef {
    /// Wraps an owned value.
    pub fn new<T: Any + Send + Sync>(value: T, type_token: TypeToken) -> Self {
        Self {
            instance: Arc::new(value),
            type_token,
        }
    }

    /// Wraps an already shared instance.
    pub fn from_shared(instance: TargetObject, type_token: TypeToken) -> Self {
        Self {
            instance,
            type_token,
        }
    }
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRef")
            .field("type_token", &self.type_token)
            .finish_non_exhaustive()
    }
}

/// Mutable view of an invocation's arguments, handed to an invoker.
///
/// `ByRef` and `Out` results are written back by replacing slots in `args`.
pub struct InvokeArgs<'a> {
    /// Argument slots, in declaration order.
    pub args: &'a mut [CallValue],
    /// Closed generic arguments for this call.
    pub type_args: &'a [TypeToken],
}

/// Closure that executes one member on an erased target.
///
/// The first parameter is the target instance. Implementations downcast it
/// to the concrete type the binding was registered for.
pub type MemberInvoker =
    Arc<dyn Fn(&(dyn Any + Send + Sync), InvokeArgs<'_>) -> CallResult<CallValue> + Send + Sync>;

/// Produces a fresh default instance of a class shape.
pub type TargetFactory = Arc<dyn Fn() -> TargetObject + Send + Sync>;

/// A signature bound to executable code on some shape.
#[derive(Clone)]
pub struct MemberBinding {
    /// Structural key the binding answers to.
    pub key: SigKey,
    /// The executable.
    pub invoker: MemberInvoker,
    /// Explicit interface implementation. Reachable through interface
    /// dispatch only, never through virtual dispatch on the class itself.
    pub explicit_only: bool,
}

impl fmt::Debug for MemberBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberBinding")
            .field("key", &self.key)
            .field("explicit_only", &self.explicit_only)
            .finish_non_exhaustive()
    }
}

/// Structured-state codec for a shape's instances.
///
/// `save` captures an instance as JSON, `load` rebuilds one. Shapes with a
/// codec participate in surrogate externalization with their target state.
#[derive(Clone)]
pub struct TargetCodec {
    /// Captures instance state.
    pub save: Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<serde_json::Value, String> + Send + Sync>,
    /// Rebuilds an instance from captured state.
    pub load: Arc<dyn Fn(&serde_json::Value) -> Result<TargetObject, String> + Send + Sync>,
}

impl fmt::Debug for TargetCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TargetCodec")
    }
}

/// Where a closed generic shape came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericOrigin {
    /// The open definition this shape closes.
    pub definition: TypeToken,
    /// Concrete arguments, one per generic parameter of the definition.
    pub args: Vec<TypeToken>,
}

/// One registered type: structure, metadata, and executable bindings.
pub struct TypeShape {
    /// Token assigned at registration.
    pub token: TypeToken,
    /// Unique name within the model.
    pub name: String,
    /// Fundamental kind.
    pub kind: TypeKind,
    /// Parent class, if any. Defaults to the model root for classes.
    pub parent: Option<TypeToken>,
    /// Interfaces this shape implements or extends directly.
    pub interfaces: Vec<TypeToken>,
    /// Members declared on this shape, in declaration order.
    pub members: Vec<MemberDescriptor>,
    /// Generic parameter names. Non-empty means the shape is an open
    /// definition and cannot be proxied.
    pub generic_params: Vec<String>,
    /// For closed generic shapes, the definition and arguments.
    pub generic_origin: Option<GenericOrigin>,
    /// Custom metadata declared on the type.
    pub attributes: Vec<AttributeData>,
    /// For primitives, the backing Rust type used for payload checks.
    pub value_type: Option<TypeId>,
    pub(crate) bindings: Vec<MemberBinding>,
    pub(crate) default_factory: Option<TargetFactory>,
    pub(crate) codec: Option<TargetCodec>,
}

impl TypeShape {
    /// True when this shape is an open generic definition.
    pub fn is_open_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Looks up a binding declared directly on this shape.
    pub fn find_binding(&self, key: &SigKey) -> Option<&MemberBinding> {
        self.bindings.iter().find(|binding| &binding.key == key)
    }

    /// Members declared on this shape with the given name.
    pub fn members_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MemberDescriptor> {
        self.members.iter().filter(move |member| member.name() == name)
    }

    /// Default instance factory, if one was registered.
    pub fn default_factory(&self) -> Option<&TargetFactory> {
        self.default_factory.as_ref()
    }

    /// State codec, if one was registered.
    pub fn codec(&self) -> Option<&TargetCodec> {
        self.codec.as_ref()
    }

    /// Whether surrogates over this shape can externalize target state.
    pub fn supports_reconstruction(&self) -> bool {
        self.codec.is_some()
    }
}

impl fmt::Debug for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeShape")
            .field("token", &self.token)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("interfaces", &self.interfaces)
            .field("members", &self.members.len())
            .field("bindings", &self.bindings.len())
            .field("generic_params", &self.generic_params)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`TypeShape`].
///
/// Finished shapes are handed to
/// [`TypeModel::register`](crate::model::TypeModel::register), which checks
/// for duplicate names and duplicate member signatures before interning.
pub struct TypeShapeBuilder {
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    pub(crate) parent: Option<TypeToken>,
    pub(crate) interfaces: Vec<TypeToken>,
    pub(crate) members: Vec<MemberDescriptor>,
    pub(crate) generic_params: Vec<String>,
    pub(crate) generic_origin: Option<GenericOrigin>,
    pub(crate) attributes: Vec<AttributeData>,
    pub(crate) value_type: Option<TypeId>,
    pub(crate) bindings: Vec<MemberBinding>,
    pub(crate) default_factory: Option<TargetFactory>,
    pub(crate) codec: Option<TargetCodec>,
}

impl TypeShapeBuilder {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            generic_params: Vec::new(),
            generic_origin: None,
            attributes: Vec::new(),
            value_type: None,
            bindings: Vec::new(),
            default_factory: None,
            codec: None,
        }
    }

    /// Starts a class shape.
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Starts an interface shape.
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Starts a primitive shape.
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Primitive)
    }

    /// Backs a primitive with a concrete Rust type for payload checks.
    pub fn backed_by<T: Any>(mut self) -> Self {
        self.value_type = Some(TypeId::of::<T>());
        self
    }

    /// Sets the parent class.
    pub fn extends(mut self, parent: TypeToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Adds a directly implemented or extended interface.
    pub fn implements(mut self, interface: TypeToken) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Declares a generic parameter, making this an open definition.
    pub fn generic_param(mut self, name: impl Into<String>) -> Self {
        self.generic_params.push(name.into());
        self
    }

    /// Records this shape as a closed instantiation of `definition`.
    pub fn closes(mut self, definition: TypeToken, args: Vec<TypeToken>) -> Self {
        self.generic_origin = Some(GenericOrigin { definition, args });
        self
    }

    /// Attaches a type-level attribute.
    pub fn attribute(mut self, attribute: AttributeData) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a fully built member descriptor.
    pub fn with_member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Declares a plain method.
    pub fn method(self, sig: MemberSig, flags: MemberFlags) -> Self {
        self.with_member(MemberDescriptor::new(sig, flags))
    }

    /// Declares a readable and writable property as a get/set accessor pair.
    pub fn property(self, name: &str, ty: TypeRef, flags: MemberFlags) -> Self {
        self.readonly_property(name, ty, flags).with_member(
            MemberDescriptor::new(
                MemberSig::method(format!("set_{name}")).with_param(ParamMode::In, ty),
                flags,
            )
            .as_accessor(AccessorKind::PropertySet, name),
        )
    }

    /// Declares a read-only property.
    pub fn readonly_property(self, name: &str, ty: TypeRef, flags: MemberFlags) -> Self {
        self.with_member(
            MemberDescriptor::new(MemberSig::method(format!("get_{name}")).returns(ty), flags)
                .as_accessor(AccessorKind::PropertyGet, name),
        )
    }

    /// Declares an event as an add/remove accessor pair.
    pub fn event(self, name: &str, handler_ty: TypeRef, flags: MemberFlags) -> Self {
        self.with_member(
            MemberDescriptor::new(
                MemberSig::method(format!("add_{name}")).with_param(ParamMode::In, handler_ty),
                flags,
            )
            .as_accessor(AccessorKind::EventAdd, name),
        )
        .with_member(
            MemberDescriptor::new(
                MemberSig::method(format!("remove_{name}")).with_param(ParamMode::In, handler_ty),
                flags,
            )
            .as_accessor(AccessorKind::EventRemove, name),
        )
    }

    /// Binds a signature to executable code on this shape.
    ///
    /// Bindings may answer for inherited or interface members, so the key
    /// does not have to match a member declared here.
    pub fn bind<F>(mut self, sig: &MemberSig, invoker: F) -> Self
    where
        F: Fn(&(dyn Any + Send + Sync), InvokeArgs<'_>) -> CallResult<CallValue>
            + Send
            + Sync
            + 'static,
    {
        self.bindings.push(MemberBinding {
            key: sig.key(),
            invoker: Arc::new(invoker),
            explicit_only: false,
        });
        self
    }

    /// Binds an explicit interface implementation. The member stays
    /// unreachable through virtual dispatch on the class.
    pub fn bind_explicit<F>(mut self, sig: &MemberSig, invoker: F) -> Self
    where
        F: Fn(&(dyn Any + Send + Sync), InvokeArgs<'_>) -> CallResult<CallValue>
            + Send
            + Sync
            + 'static,
    {
        self.bindings.push(MemberBinding {
            key: sig.key(),
            invoker: Arc::new(invoker),
            explicit_only: true,
        });
        self
    }

    /// Registers a default instance factory.
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> TargetObject + Send + Sync + 'static,
    {
        self.default_factory = Some(Arc::new(factory));
        self
    }

    /// Registers a state codec.
    pub fn codec<S, L>(mut self, save: S, load: L) -> Self
    where
        S: Fn(&(dyn Any + Send + Sync)) -> Result<serde_json::Value, String> + Send + Sync + 'static,
        L: Fn(&serde_json::Value) -> Result<TargetObject, String> + Send + Sync + 'static,
    {
        self.codec = Some(TargetCodec {
            save: Arc::new(save),
            load: Arc::new(load),
        });
        self
    }
}
