//! The type model: interned shapes and structural queries.
//!
//! A [`TypeModel`] owns every registered [`TypeShape`] and answers the
//! questions the engine asks during synthesis and dispatch: hierarchy walks,
//! transitive interface closures, subtype checks, and invoker resolution.
//! Registration is the only mutation; lookups clone `Arc`s out of the lock
//! so callers never hold it.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ModelError;
use crate::shape::{MemberBinding, TypeShape, TypeShapeBuilder};
use crate::types::{MemberFlags, MemberSig, ParamMode, SigKey, TypeKind, TypeRef, TypeToken};

/// Tokens of the shapes every bootstrapped model starts with.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    /// Universal base class. Its members are never intercepted.
    pub object: TypeToken,
    /// The `()` primitive.
    pub unit: TypeToken,
    /// The `bool` primitive.
    pub boolean: TypeToken,
    /// The `i64` primitive.
    pub int: TypeToken,
    /// The `f64` primitive.
    pub float: TypeToken,
    /// The `String` primitive.
    pub string: TypeToken,
}

struct ModelInner {
    shapes: Vec<Arc<TypeShape>>,
    by_name: FxHashMap<String, TypeToken>,
    root: Option<TypeToken>,
    builtins: Option<Builtins>,
}

/// Registry of every type shape the engine can reason about.
pub struct TypeModel {
    inner: RwLock<ModelInner>,
}

impl TypeModel {
    /// An empty model with no root. Mostly useful in tests; production
    /// models start from [`TypeModel::with_builtins`].
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ModelInner {
                shapes: Vec::new(),
                by_name: FxHashMap::default(),
                root: None,
                builtins: None,
            }),
        }
    }

    /// A model bootstrapped with the universal root `object` and the value
    /// primitives. Classes registered afterwards default their parent to
    /// `object`.
    pub fn with_builtins() -> Self {
        let model = Self::new();
        let register = |builder: TypeShapeBuilder| match model.register(builder) {
            Ok(token) => token,
            Err(_) => unreachable!("bootstrap registration cannot collide in a fresh model"),
        };

        let unit = register(TypeShapeBuilder::primitive("unit").backed_by::<()>());
        let boolean = register(TypeShapeBuilder::primitive("bool").backed_by::<bool>());
        let int = register(TypeShapeBuilder::primitive("int").backed_by::<i64>());
        let float = register(TypeShapeBuilder::primitive("float").backed_by::<f64>());
        let string = register(TypeShapeBuilder::primitive("string").backed_by::<String>());

        // The root mentions itself in `equals`, so its token is computed
        // before registration.
        let object_token = TypeToken(model.len());
        let object = register(
            TypeShapeBuilder::class("object")
                .method(
                    MemberSig::method("to_string").returns(TypeRef::Concrete(string)),
                    MemberFlags::overridable(),
                )
                .method(
                    MemberSig::method("equals")
                        .with_param(ParamMode::In, TypeRef::Concrete(object_token))
                        .returns(TypeRef::Concrete(boolean)),
                    MemberFlags::overridable(),
                )
                .method(
                    MemberSig::method("hash_code").returns(TypeRef::Concrete(int)),
                    MemberFlags::overridable(),
                ),
        );

        let mut inner = model.inner.write();
        inner.root = Some(object);
        inner.builtins = Some(Builtins {
            object,
            unit,
            boolean,
            int,
            float,
            string,
        });
        drop(inner);
        model
    }

    /// Interns a shape and assigns its token.
    ///
    /// Fails on duplicate type names, duplicate member signatures within the
    /// shape, and references to unknown tokens. Classes with no explicit
    /// parent are attached to the model root when one exists.
    pub fn register(&self, builder: TypeShapeBuilder) -> Result<TypeToken, ModelError> {
        let mut inner = self.inner.write();

        if builder.name.is_empty() {
            return Err(ModelError::EmptyTypeName);
        }
        if inner.by_name.contains_key(&builder.name) {
            return Err(ModelError::DuplicateType(builder.name));
        }

        let mut seen: FxHashSet<SigKey> = FxHashSet::default();
        for member in &builder.members {
            if !seen.insert(member.key()) {
                return Err(ModelError::DuplicateMember {
                    type_name: builder.name.clone(),
                    member: member.name().to_string(),
                });
            }
        }

        let known = |token: TypeToken| token.index() < inner.shapes.len();
        if let Some(parent) = builder.parent {
            if !known(parent) {
                return Err(ModelError::UnknownToken(parent.index()));
            }
        }
        for interface in &builder.interfaces {
            if !known(*interface) {
                return Err(ModelError::UnknownToken(interface.index()));
            }
        }
        if let Some(origin) = &builder.generic_origin {
            if !known(origin.definition) {
                return Err(ModelError::UnknownToken(origin.definition.index()));
            }
            for arg in &origin.args {
                if !known(*arg) {
                    return Err(ModelError::UnknownToken(arg.index()));
                }
            }
        }

        let token = TypeToken(inner.shapes.len());
        let parent = match (builder.kind, builder.parent) {
            (TypeKind::Class, None) => inner.root,
            (_, parent) => parent,
        };

        let mut members = builder.members;
        for member in &mut members {
            member.declaring = token;
        }

        let shape = Arc::new(TypeShape {
            token,
            name: builder.name,
            kind: builder.kind,
            parent,
            interfaces: builder.interfaces,
            members,
            generic_params: builder.generic_params,
            generic_origin: builder.generic_origin,
            attributes: builder.attributes,
            value_type: builder.value_type,
            bindings: builder.bindings,
            default_factory: builder.default_factory,
            codec: builder.codec,
        });

        inner.by_name.insert(shape.name.clone(), token);
        inner.shapes.push(shape);
        Ok(token)
    }

    /// Shape for a token.
    pub fn get(&self, token: TypeToken) -> Option<Arc<TypeShape>> {
        self.inner.read().shapes.get(token.index()).cloned()
    }

    /// Shape for a token, or a typed error naming the index.
    pub fn expect(&self, token: TypeToken) -> Result<Arc<TypeShape>, ModelError> {
        self.get(token)
            .ok_or(ModelError::UnknownToken(token.index()))
    }

    /// Token for a registered name.
    pub fn by_name(&self, name: &str) -> Option<TypeToken> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Display name for a token, or a placeholder for unknown tokens.
    pub fn name_of(&self, token: TypeToken) -> String {
        match self.get(token) {
            Some(shape) => shape.name.clone(),
            None => format!("<unknown #{}>", token.index()),
        }
    }

    /// The universal root, when bootstrapped.
    pub fn root(&self) -> Option<TypeToken> {
        self.inner.read().root
    }

    /// Builtin tokens, when bootstrapped.
    pub fn builtins(&self) -> Option<Builtins> {
        self.inner.read().builtins
    }

    /// Number of registered shapes.
    pub fn len(&self) -> usize {
        self.inner.read().shapes.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().shapes.is_empty()
    }

    /// Class chain from `token` up to and including the root.
    ///
    /// Interfaces and primitives return just themselves.
    pub fn hierarchy(&self, token: TypeToken) -> Vec<TypeToken> {
        let mut chain = Vec::new();
        let mut current = Some(token);
        while let Some(tok) = current {
            let Some(shape) = self.get(tok) else { break };
            chain.push(tok);
            current = shape.parent;
        }
        chain
    }

    /// Transitive interface closure of the given seeds, in first-seen order.
    /// Seeds appear in the result before anything they extend.
    pub fn interface_closure(&self, seeds: &[TypeToken]) -> Vec<TypeToken> {
        let mut order = Vec::new();
        let mut seen: FxHashSet<TypeToken> = FxHashSet::default();
        let mut queue: Vec<TypeToken> = seeds.to_vec();
        let mut head = 0;
        while head < queue.len() {
            let tok = queue[head];
            head += 1;
            if !seen.insert(tok) {
                continue;
            }
            order.push(tok);
            if let Some(shape) = self.get(tok) {
                queue.extend(shape.interfaces.iter().copied());
            }
        }
        order
    }

    /// Every interface a type satisfies: its own closure for interfaces,
    /// the closure of every interface along the class chain for classes.
    pub fn interfaces_of(&self, token: TypeToken) -> Vec<TypeToken> {
        match self.get(token).map(|shape| shape.kind) {
            Some(TypeKind::Interface) => self.interface_closure(&[token]),
            Some(_) => {
                let mut seeds = Vec::new();
                for tok in self.hierarchy(token) {
                    if let Some(shape) = self.get(tok) {
                        seeds.extend(shape.interfaces.iter().copied());
                    }
                }
                self.interface_closure(&seeds)
            }
            None => Vec::new(),
        }
    }

    /// Nominal subtype check: identity, class ancestry, or interface
    /// satisfaction.
    pub fn is_subtype(&self, sub: TypeToken, sup: TypeToken) -> bool {
        if sub == sup {
            return true;
        }
        if self.hierarchy(sub).contains(&sup) {
            return true;
        }
        self.interfaces_of(sub).contains(&sup)
    }

    /// Finds the binding that answers `key` on `start`, walking the class
    /// chain for classes and the extension closure for interfaces. The most
    /// derived binding wins.
    pub fn resolve_invoker(&self, start: TypeToken, key: &SigKey) -> Option<ResolvedBinding> {
        let candidates = match self.get(start).map(|shape| shape.kind) {
            Some(TypeKind::Interface) => self.interface_closure(&[start]),
            Some(_) => self.hierarchy(start),
            None => return None,
        };
        for tok in candidates {
            if let Some(shape) = self.get(tok) {
                if let Some(binding) = shape.find_binding(key) {
                    return Some(ResolvedBinding {
                        declaring: tok,
                        binding: binding.clone(),
                    });
                }
            }
        }
        None
    }
}

impl Default for TypeModel {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// A binding found by [`TypeModel::resolve_invoker`], with the shape that
/// declared it.
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    /// Shape the binding was registered on.
    pub declaring: TypeToken,
    /// The binding itself.
    pub binding: MemberBinding,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CallValue;

    #[test]
    fn test_builtins_are_registered() {
        let model = TypeModel::with_builtins();
        let builtins = model.builtins().unwrap();

        assert_eq!(model.root(), Some(builtins.object));
        assert_eq!(model.by_name("object"), Some(builtins.object));
        assert_eq!(model.by_name("int"), Some(builtins.int));
        assert_eq!(model.by_name("string"), Some(builtins.string));

        let int = model.get(builtins.int).unwrap();
        assert_eq!(int.kind, TypeKind::Primitive);
        assert_eq!(int.value_type, Some(std::any::TypeId::of::<i64>()));
    }

    #[test]
    fn test_duplicate_type_name_rejected() {
        let model = TypeModel::new();
        model.register(TypeShapeBuilder::class("Widget")).unwrap();
        let err = model.register(TypeShapeBuilder::class("Widget")).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateType(name) if name == "Widget"));
    }

    #[test]
    fn test_duplicate_member_signature_rejected() {
        let model = TypeModel::new();
        let sig = MemberSig::method("run").with_param(ParamMode::In, TypeRef::Void);
        let err = model
            .register(
                TypeShapeBuilder::class("Widget")
                    .method(sig.clone(), MemberFlags::overridable())
                    .method(sig, MemberFlags::non_virtual()),
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateMember { member, .. } if member == "run"));
    }

    #[test]
    fn test_overloads_by_arity_are_distinct() {
        let model = TypeModel::new();
        let token = model
            .register(
                TypeShapeBuilder::class("Widget")
                    .method(MemberSig::method("run"), MemberFlags::overridable())
                    .method(
                        MemberSig::method("run").with_param(ParamMode::In, TypeRef::Void),
                        MemberFlags::overridable(),
                    ),
            )
            .unwrap();
        assert_eq!(model.get(token).unwrap().members.len(), 2);
    }

    #[test]
    fn test_classes_default_parent_to_root() {
        let model = TypeModel::with_builtins();
        let token = model.register(TypeShapeBuilder::class("Widget")).unwrap();
        assert_eq!(model.get(token).unwrap().parent, model.root());

        let hierarchy = model.hierarchy(token);
        assert_eq!(hierarchy, vec![token, model.root().unwrap()]);
    }

    #[test]
    fn test_interfaces_have_no_implicit_parent() {
        let model = TypeModel::with_builtins();
        let token = model.register(TypeShapeBuilder::interface("IWidget")).unwrap();
        assert_eq!(model.get(token).unwrap().parent, None);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let model = TypeModel::new();
        let err = model
            .register(TypeShapeBuilder::class("Widget").extends(TypeToken(99)))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownToken(99)));
    }

    #[test]
    fn test_interface_closure_handles_diamond() {
        let model = TypeModel::new();
        let base = model.register(TypeShapeBuilder::interface("IBase")).unwrap();
        let left = model
            .register(TypeShapeBuilder::interface("ILeft").implements(base))
            .unwrap();
        let right = model
            .register(TypeShapeBuilder::interface("IRight").implements(base))
            .unwrap();

        let closure = model.interface_closure(&[left, right]);
        assert_eq!(closure, vec![left, right, base]);
    }

    #[test]
    fn test_subtype_through_class_chain_and_interfaces() {
        let model = TypeModel::with_builtins();
        let greeter = model.register(TypeShapeBuilder::interface("IGreeter")).unwrap();
        let base = model
            .register(TypeShapeBuilder::class("Base").implements(greeter))
            .unwrap();
        let derived = model
            .register(TypeShapeBuilder::class("Derived").extends(base))
            .unwrap();

        assert!(model.is_subtype(derived, base));
        assert!(model.is_subtype(derived, greeter));
        assert!(model.is_subtype(derived, model.root().unwrap()));
        assert!(!model.is_subtype(base, derived));
        assert!(!model.is_subtype(greeter, base));
    }

    #[test]
    fn test_resolve_invoker_prefers_most_derived() {
        let model = TypeModel::new();
        let sig = MemberSig::method("speak");
        let base = model
            .register(
                TypeShapeBuilder::class("Base").bind(&sig, |_, _| Ok(CallValue::string("base"))),
            )
            .unwrap();
        let derived = model
            .register(
                TypeShapeBuilder::class("Derived")
                    .extends(base)
                    .bind(&sig, |_, _| Ok(CallValue::string("derived"))),
            )
            .unwrap();

        let resolved = model.resolve_invoker(derived, &sig.key()).unwrap();
        assert_eq!(resolved.declaring, derived);

        let on_base = model.resolve_invoker(base, &sig.key()).unwrap();
        assert_eq!(on_base.declaring, base);
    }

    #[test]
    fn test_resolve_invoker_walks_up_when_missing_locally() {
        let model = TypeModel::new();
        let sig = MemberSig::method("speak");
        let base = model
            .register(
                TypeShapeBuilder::class("Base").bind(&sig, |_, _| Ok(CallValue::string("base"))),
            )
            .unwrap();
        let derived = model
            .register(TypeShapeBuilder::class("Derived").extends(base))
            .unwrap();

        let resolved = model.resolve_invoker(derived, &sig.key()).unwrap();
        assert_eq!(resolved.declaring, base);
        assert!(!resolved.binding.explicit_only);
    }
}
