//! Member selection, hook notifications, and metadata replication through
//! the public engine API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use interpose_engine::{
    CallError, CallValue, GenerationOptions, ProxyEngine, TypeModel, TypeShapeBuilder, TypeToken,
};
use interpose_sdk::{
    AttributeData, MemberDescriptor, MemberFlags, MemberSig, SelectionHook, TypeRef, TypeShape,
    Visibility,
};

/// Rejects one member by name and records everything it is told.
#[derive(Default)]
struct Auditing {
    reject: Option<&'static str>,
    non_overridable: Mutex<Vec<String>>,
    completions: AtomicUsize,
}

impl SelectionHook for Auditing {
    fn should_intercept(&self, _declaring: &TypeShape, member: &MemberDescriptor) -> bool {
        self.reject != Some(member.name())
    }

    fn notify_non_overridable(&self, _declaring: &TypeShape, member: &MemberDescriptor) {
        self.non_overridable.lock().push(member.name().to_string());
    }

    fn selection_completed(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }

    fn fingerprint(&self) -> u64 {
        31
    }
}

struct Mixed;

fn mixed_model() -> (Arc<TypeModel>, TypeToken) {
    let model = Arc::new(TypeModel::with_builtins());
    let b = model.builtins().unwrap();

    let open_sig = MemberSig::method("open").returns(TypeRef::Concrete(b.int));
    let seal_sig = MemberSig::method("seal");
    let helper_sig = MemberSig::method("helper");
    let hidden_sig = MemberSig::method("hidden");
    let shared_sig = MemberSig::method("shared");
    let get_size = MemberSig::method("get_size").returns(TypeRef::Concrete(b.int));
    let set_size = MemberSig::method("set_size")
        .with_param(interpose_sdk::ParamMode::In, TypeRef::Concrete(b.int));

    let class = model
        .register(
            TypeShapeBuilder::class("Mixed")
                .method(open_sig.clone(), MemberFlags::overridable())
                .method(seal_sig, MemberFlags::overridable().as_final())
                .method(helper_sig, MemberFlags::non_virtual())
                .method(
                    hidden_sig,
                    MemberFlags::overridable().with_visibility(Visibility::Private),
                )
                .method(
                    shared_sig.clone(),
                    MemberFlags::overridable()
                        .with_visibility(Visibility::Internal)
                        .as_engine_visible(),
                )
                .property("size", TypeRef::Concrete(b.int), MemberFlags::overridable())
                .bind(&open_sig, |_, _| Ok(CallValue::int(1)))
                .bind(&shared_sig, |_, _| Ok(CallValue::unit()))
                .bind(&get_size, |_, _| Ok(CallValue::int(4)))
                .bind(&set_size, |_, _| Ok(CallValue::unit()))
                .factory(|| Arc::new(Mixed)),
        )
        .unwrap();
    (model, class)
}

#[test]
fn test_structural_exclusions_and_hook_filtering() {
    let (model, class) = mixed_model();
    let engine = ProxyEngine::new(model);

    let hook = Arc::new(Auditing { reject: Some("set_size"), ..Auditing::default() });
    let proxy = engine
        .create_class_proxy(
            class,
            GenerationOptions::new().with_hook(hook.clone()),
            Vec::new(),
        )
        .unwrap();

    let names: Vec<&str> = proxy
        .blueprint()
        .members
        .iter()
        .map(|member| member.descriptor.name())
        .collect();

    // Virtual public members and engine-visible internals stay; sealed,
    // non-virtual, private, and hook-rejected members do not.
    assert_eq!(names, vec!["open", "shared", "get_size"]);

    let notified = hook.non_overridable.lock().clone();
    assert!(notified.contains(&"seal".to_string()));
    assert!(notified.contains(&"helper".to_string()));
    assert!(!notified.contains(&"hidden".to_string()));

    // Hook-rejected members vanish silently.
    let err = proxy.invoke("set_size", vec![CallValue::int(2)]).unwrap_err();
    assert!(matches!(err, CallError::MissingMember { .. }));
}

#[test]
fn test_selection_runs_once_per_blueprint_not_per_surrogate() {
    let (model, class) = mixed_model();
    let engine = ProxyEngine::new(model);

    let hook = Arc::new(Auditing::default());
    for _ in 0..3 {
        engine
            .create_class_proxy(
                class,
                GenerationOptions::new().with_hook(hook.clone()),
                Vec::new(),
            )
            .unwrap();
    }

    assert_eq!(hook.completions.load(Ordering::SeqCst), 1);
    assert_eq!(engine.cache().synthesis_count(), 1);
}

#[test]
fn test_filtered_accessor_leaves_a_half_property() {
    let (model, class) = mixed_model();
    let engine = ProxyEngine::new(model);

    let hook = Arc::new(Auditing { reject: Some("set_size"), ..Auditing::default() });
    let proxy = engine
        .create_class_proxy(class, GenerationOptions::new().with_hook(hook), Vec::new())
        .unwrap();

    let group = proxy.blueprint().property("size").unwrap();
    assert!(group.getter.is_some());
    assert!(group.setter.is_none());

    assert_eq!(proxy.get("size").unwrap().as_i64(), Some(4));
    let err = proxy.set("size", CallValue::int(9)).unwrap_err();
    assert!(matches!(err, CallError::PropertyNotWritable { name } if name == "size"));
}

#[test]
fn test_attribute_replication_is_best_effort() {
    let model = Arc::new(TypeModel::with_builtins());
    let b = model.builtins().unwrap();
    let run_sig = MemberSig::method("run").returns(TypeRef::Concrete(b.int));

    struct Queued;
    let run = MemberDescriptor::new(run_sig.clone(), MemberFlags::overridable())
        .with_attribute(AttributeData::new("retry").with_value("count", "3"))
        .with_attribute(AttributeData::new("audit").as_inherited())
        .with_attribute(AttributeData::new("transient").non_replicable());
    let class = model
        .register(
            TypeShapeBuilder::class("Queued")
                .attribute(AttributeData::new("queue").with_value("name", "jobs"))
                .with_member(run)
                .bind(&run_sig, |_, _| Ok(CallValue::int(0)))
                .factory(|| Arc::new(Queued)),
        )
        .unwrap();
    let engine = ProxyEngine::new(model);

    let proxy = engine
        .create_class_proxy(class, GenerationOptions::new(), Vec::new())
        .unwrap();
    let blueprint = proxy.blueprint();

    // Inherited attributes flow to the generated member on their own and
    // non-replicable ones are dropped with a warning, so only `retry` lands.
    let replicated: Vec<&str> = blueprint.members[0]
        .replicated
        .iter()
        .map(|attribute| attribute.name.as_str())
        .collect();
    assert_eq!(replicated, vec!["retry"]);

    let type_attrs: Vec<&str> = blueprint
        .type_attributes
        .iter()
        .map(|attribute| attribute.name.as_str())
        .collect();
    assert_eq!(type_attrs, vec!["queue"]);
}
