//! Structural type and member descriptions.
//!
//! The engine never inspects Rust types directly. Proxyable surfaces are
//! described with the small vocabulary in this module: interned
//! [`TypeToken`]s, positional [`TypeRef`]s for generic parameters, and
//! [`MemberSig`] signatures that reduce to a structural [`SigKey`].
//!
//! Two descriptors produced independently for the same logical member
//! (a common artifact of walking an inheritance graph twice) carry distinct
//! [`MemberId`]s but equal [`SigKey`]s, and the catalog folds them together
//! on that basis.

use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Tokens
// ============================================================================

/// Interned handle for a registered type shape.
///
/// Tokens are indices into a [`TypeModel`](crate::model::TypeModel) and are
/// only meaningful against the model that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeToken(pub(crate) usize);

impl TypeToken {
    /// Sentinel for descriptors built before their shape is registered.
    /// Replaced with the real token during registration.
    pub(crate) const UNREGISTERED: TypeToken = TypeToken(usize::MAX);

    /// Raw index of this token within its model.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of one reflected member artifact.
///
/// Never part of structural equality. Two artifacts describing the same
/// logical member get different ids and identical [`SigKey`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(usize);

static NEXT_MEMBER_ID: AtomicUsize = AtomicUsize::new(1);

impl MemberId {
    /// Allocates a fresh artifact id.
    pub fn next() -> Self {
        Self(NEXT_MEMBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Type references
// ============================================================================

/// What a registered shape fundamentally is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Concrete type with an inheritance chain and overridable members.
    Class,
    /// Pure contract. Members are always overridable.
    Interface,
    /// Built-in value type backed by a concrete Rust type.
    Primitive,
}

/// A type position inside a signature.
///
/// Generic parameters are referenced by position only, which is exactly what
/// makes signature equality structural: `fn f<T>(x: T)` declared twice yields
/// equal refs even though each declaration minted its own parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A registered type.
    Concrete(TypeToken),
    /// The n-th generic parameter of the declaring type.
    ClassParam(u16),
    /// The n-th generic parameter of the member itself.
    MethodParam(u16),
    /// No value. Only meaningful as a return type.
    Void,
}

// ============================================================================
// Signatures
// ============================================================================

/// How an argument travels across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamMode {
    /// Passed in, never written back.
    In,
    /// Passed in and written back after the target returns.
    ByRef,
    /// Placeholder in, value written back. The incoming slot is ignored.
    Out,
}

/// One parameter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamSig {
    /// Passing mode.
    pub mode: ParamMode,
    /// Declared type.
    pub ty: TypeRef,
}

/// A member signature as declared on a shape.
#[derive(Debug, Clone)]
pub struct MemberSig {
    /// Member name. Accessor members use their mangled accessor name
    /// (`get_x`, `set_x`, `add_x`, `remove_x`).
    pub name: String,
    /// Number of generic parameters the member declares.
    pub type_params: u16,
    /// Ordered parameters.
    pub params: Vec<ParamSig>,
    /// Return type.
    pub ret: TypeRef,
}

impl MemberSig {
    /// Starts a signature with no parameters and a `Void` return.
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_params: 0,
            params: Vec::new(),
            ret: TypeRef::Void,
        }
    }

    /// Appends a parameter.
    pub fn with_param(mut self, mode: ParamMode, ty: TypeRef) -> Self {
        self.params.push(ParamSig { mode, ty });
        self
    }

    /// Declares generic parameters on the member.
    pub fn with_type_params(mut self, count: u16) -> Self {
        self.type_params = count;
        self
    }

    /// Sets the return type.
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.ret = ty;
        self
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Structural key for dedup and invoker lookup.
    pub fn key(&self) -> SigKey {
        SigKey {
            name: self.name.clone(),
            type_params: self.type_params,
            params: self.params.clone(),
            ret: self.ret,
        }
    }
}

/// Structural identity of a member signature.
///
/// Equality and hashing cover name, generic arity, parameter modes and types
/// in order, and the return type. Declaring type and artifact id are
/// deliberately excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigKey {
    name: String,
    type_params: u16,
    params: Vec<ParamSig>,
    ret: TypeRef,
}

impl SigKey {
    /// Member name component of the key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parameters in the key.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

// ============================================================================
// Member descriptors
// ============================================================================

/// Role a member plays on its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    /// Plain callable member.
    Method,
    /// Property getter.
    PropertyGet,
    /// Property setter.
    PropertySet,
    /// Event subscription.
    EventAdd,
    /// Event unsubscription.
    EventRemove,
}

/// Declared visibility of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible everywhere.
    Public,
    /// Visible to subtypes.
    Protected,
    /// Visible inside the declaring assembly only.
    Internal,
    /// Never proxyable.
    Private,
}

/// Modifier set for a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberFlags {
    /// Declared visibility.
    pub visibility: Visibility,
    /// Overridable through virtual dispatch.
    pub is_virtual: bool,
    /// Declared without an implementation.
    pub is_abstract: bool,
    /// Belongs to the type, not an instance.
    pub is_static: bool,
    /// Declared virtual upstream but closed to further overriding here.
    pub is_final: bool,
    /// Internal member explicitly opened to the proxy engine.
    pub engine_visible: bool,
}

impl MemberFlags {
    /// Public instance member open to virtual dispatch.
    pub fn overridable() -> Self {
        Self {
            visibility: Visibility::Public,
            is_virtual: true,
            is_abstract: false,
            is_static: false,
            is_final: false,
            engine_visible: false,
        }
    }

    /// Public instance member closed to virtual dispatch.
    pub fn non_virtual() -> Self {
        Self {
            is_virtual: false,
            ..Self::overridable()
        }
    }

    /// Changes visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Marks the member abstract.
    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self.is_virtual = true;
        self
    }

    /// Marks the member static.
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Seals an otherwise virtual member.
    pub fn as_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Opens an `Internal` member to the engine.
    pub fn as_engine_visible(mut self) -> Self {
        self.engine_visible = true;
        self
    }
}

impl Default for MemberFlags {
    fn default() -> Self {
        Self::overridable()
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// One piece of custom metadata attached to a type or member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeData {
    /// Attribute name.
    pub name: String,
    /// Named values carried by the attribute.
    pub values: Vec<(String, String)>,
    /// Inheritable metadata flows to subtypes on its own and is therefore
    /// never replicated onto generated counterparts.
    pub inherited: bool,
    /// Whether the attribute can be cloned onto a generated counterpart.
    /// Replication is best effort and non-replicable items are skipped.
    pub replicable: bool,
}

impl AttributeData {
    /// A replicable, non-inherited attribute.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            inherited: false,
            replicable: true,
        }
    }

    /// Adds a named value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }

    /// Marks the attribute as inheritable.
    pub fn as_inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    /// Marks the attribute as impossible to replicate.
    pub fn non_replicable(mut self) -> Self {
        self.replicable = false;
        self
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Full description of one member as declared on one shape.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// Artifact identity, unique per descriptor instance.
    pub id: MemberId,
    /// Shape the member is declared on.
    pub declaring: TypeToken,
    /// Declared signature.
    pub sig: MemberSig,
    /// Accessor role.
    pub accessor: AccessorKind,
    /// Property or event this accessor belongs to, if any.
    pub group: Option<String>,
    /// Modifiers.
    pub flags: MemberFlags,
    /// Custom metadata declared on the member.
    pub attributes: Vec<AttributeData>,
}

impl MemberDescriptor {
    /// Plain method descriptor with default flags. The declaring token is
    /// filled in when the owning shape is registered.
    pub fn new(sig: MemberSig, flags: MemberFlags) -> Self {
        Self {
            id: MemberId::next(),
            declaring: TypeToken::UNREGISTERED,
            sig,
            accessor: AccessorKind::Method,
            group: None,
            flags,
            attributes: Vec::new(),
        }
    }

    /// Assigns an accessor role and its owning group.
    pub fn as_accessor(mut self, kind: AccessorKind, group: impl Into<String>) -> Self {
        self.accessor = kind;
        self.group = Some(group.into());
        self
    }

    /// Attaches an attribute.
    pub fn with_attribute(mut self, attribute: AttributeData) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Structural key of the declared signature.
    pub fn key(&self) -> SigKey {
        self.sig.key()
    }

    /// Member name shorthand.
    pub fn name(&self) -> &str {
        &self.sig.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    fn sig_with_generic(name: &str) -> MemberSig {
        MemberSig::method(name)
            .with_type_params(1)
            .with_param(ParamMode::In, TypeRef::MethodParam(0))
            .returns(TypeRef::MethodParam(0))
    }

    #[test]
    fn test_sig_key_is_structural() {
        // Same logical member reflected twice: fresh descriptors, equal keys.
        let a = MemberDescriptor::new(sig_with_generic("echo"), MemberFlags::overridable());
        let b = MemberDescriptor::new(sig_with_generic("echo"), MemberFlags::overridable());
        assert_ne!(a.id, b.id);
        assert_eq!(a.key(), b.key());

        let mut set = FxHashSet::default();
        set.insert(a.key());
        set.insert(b.key());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_sig_key_distinguishes_shape() {
        let base = MemberSig::method("f").with_param(ParamMode::In, TypeRef::Void);
        let renamed = MemberSig::method("g").with_param(ParamMode::In, TypeRef::Void);
        let by_ref = MemberSig::method("f").with_param(ParamMode::ByRef, TypeRef::Void);
        let generic = MemberSig::method("f")
            .with_param(ParamMode::In, TypeRef::Void)
            .with_type_params(1);

        assert_ne!(base.key(), renamed.key());
        assert_ne!(base.key(), by_ref.key());
        assert_ne!(base.key(), generic.key());
        assert_eq!(base.key(), base.clone().key());
    }

    #[test]
    fn test_generic_params_compare_by_position() {
        // T in one declaration and U in another occupy position 0 in both.
        assert_eq!(TypeRef::MethodParam(0), TypeRef::MethodParam(0));
        assert_ne!(TypeRef::MethodParam(0), TypeRef::MethodParam(1));
        assert_ne!(TypeRef::MethodParam(0), TypeRef::ClassParam(0));
    }

    #[test]
    fn test_member_ids_are_unique() {
        let ids: FxHashSet<_> = (0..64).map(|_| MemberId::next()).collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_flag_builders() {
        let flags = MemberFlags::overridable()
            .with_visibility(Visibility::Internal)
            .as_engine_visible();
        assert_eq!(flags.visibility, Visibility::Internal);
        assert!(flags.engine_visible);
        assert!(flags.is_virtual);

        let sealed = MemberFlags::non_virtual().as_final();
        assert!(!sealed.is_virtual);
        assert!(sealed.is_final);
    }

    #[test]
    fn test_attribute_builder() {
        let attr = AttributeData::new("audit")
            .with_value("level", "high")
            .non_replicable();
        assert_eq!(attr.name, "audit");
        assert_eq!(attr.values, vec![("level".to_string(), "high".to_string())]);
        assert!(!attr.replicable);
        assert!(!attr.inherited);
    }
}
