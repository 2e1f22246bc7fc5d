//! End-to-end interception lifecycle tests over the public engine API.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use interpose_engine::{
    CallError, CallResult, CallValue, GenerationOptions, Interceptor, Invocation, ProxyEngine,
    Surrogate, TypeModel, TypeShapeBuilder, TypeToken,
};
use interpose_sdk::{MemberFlags, MemberSig, ParamMode, TypeRef};

// ============================================================================
// Fixtures
// ============================================================================

type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct Turnstile {
    count: AtomicI64,
    label: Mutex<String>,
    handlers: AtomicUsize,
}

/// Registers a `Turnstile` class whose bindings append `target:<member>`
/// entries to `log` as they run.
fn turnstile_model(log: CallLog) -> (Arc<TypeModel>, TypeToken) {
    let model = Arc::new(TypeModel::with_builtins());
    let b = model.builtins().unwrap();

    let push_sig = MemberSig::method("push")
        .with_param(ParamMode::In, TypeRef::Concrete(b.int))
        .returns(TypeRef::Concrete(b.int));
    let fail_sig = MemberSig::method("fail").returns(TypeRef::Concrete(b.int));
    let get_label = MemberSig::method("get_label").returns(TypeRef::Concrete(b.string));
    let set_label =
        MemberSig::method("set_label").with_param(ParamMode::In, TypeRef::Concrete(b.string));
    let add_clicked =
        MemberSig::method("add_clicked").with_param(ParamMode::In, TypeRef::Concrete(b.object));
    let remove_clicked =
        MemberSig::method("remove_clicked").with_param(ParamMode::In, TypeRef::Concrete(b.object));

    let push_log = log.clone();
    let fail_log = log.clone();
    let get_log = log.clone();
    let set_log = log.clone();

    let class = model
        .register(
            TypeShapeBuilder::class("Turnstile")
                .method(push_sig.clone(), MemberFlags::overridable())
                .method(fail_sig.clone(), MemberFlags::overridable())
                .property("label", TypeRef::Concrete(b.string), MemberFlags::overridable())
                .event("clicked", TypeRef::Concrete(b.object), MemberFlags::overridable())
                .bind(&push_sig, move |target, call| {
                    push_log.lock().push("target:push".to_string());
                    let turnstile = target.downcast_ref::<Turnstile>().unwrap();
                    let step = call.args[0].as_i64().unwrap_or(0);
                    Ok(CallValue::int(
                        turnstile.count.fetch_add(step, Ordering::SeqCst) + step,
                    ))
                })
                .bind(&fail_sig, move |_, _| {
                    fail_log.lock().push("target:fail".to_string());
                    Err(CallError::application(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        "jammed",
                    )))
                })
                .bind(&get_label, move |target, _| {
                    get_log.lock().push("target:get_label".to_string());
                    let turnstile = target.downcast_ref::<Turnstile>().unwrap();
                    Ok(CallValue::string(turnstile.label.lock().clone()))
                })
                .bind(&set_label, move |target, call| {
                    set_log.lock().push("target:set_label".to_string());
                    let turnstile = target.downcast_ref::<Turnstile>().unwrap();
                    *turnstile.label.lock() =
                        call.args[0].as_str().unwrap_or_default().to_string();
                    Ok(CallValue::unit())
                })
                .bind(&add_clicked, |target, _| {
                    let turnstile = target.downcast_ref::<Turnstile>().unwrap();
                    turnstile.handlers.fetch_add(1, Ordering::SeqCst);
                    Ok(CallValue::unit())
                })
                .bind(&remove_clicked, |target, _| {
                    let turnstile = target.downcast_ref::<Turnstile>().unwrap();
                    turnstile.handlers.fetch_sub(1, Ordering::SeqCst);
                    Ok(CallValue::unit())
                })
                .factory(|| Arc::new(Turnstile::default())),
        )
        .unwrap();
    (model, class)
}

fn proxy_with(
    log: &CallLog,
    interceptors: Vec<Arc<dyn Interceptor>>,
) -> (ProxyEngine, Surrogate) {
    let (model, class) = turnstile_model(log.clone());
    let engine = ProxyEngine::new(model);
    let proxy = engine
        .create_class_proxy(class, GenerationOptions::new(), interceptors)
        .unwrap();
    (engine, proxy)
}

/// Proceeds and records entry and exit around the rest of the chain.
struct Recording {
    name: &'static str,
    log: CallLog,
}

impl Interceptor for Recording {
    fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()> {
        self.log
            .lock()
            .push(format!("{}:enter:{}", self.name, invocation.member_name()));
        let result = invocation.proceed();
        self.log.lock().push(format!("{}:exit", self.name));
        result
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_interceptors_nest_in_registration_order() {
    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(
        &log,
        vec![
            Arc::new(Recording { name: "outer", log: log.clone() }),
            Arc::new(Recording { name: "inner", log: log.clone() }),
        ],
    );

    let out = proxy.invoke("push", vec![CallValue::int(2)]).unwrap();
    assert_eq!(out.as_i64(), Some(2));
    assert_eq!(
        *log.lock(),
        vec![
            "outer:enter:push",
            "inner:enter:push",
            "target:push",
            "inner:exit",
            "outer:exit",
        ]
    );
}

#[test]
fn test_empty_chain_still_reaches_target() {
    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(&log, Vec::new());

    assert_eq!(proxy.invoke("push", vec![CallValue::int(5)]).unwrap().as_i64(), Some(5));
    assert_eq!(proxy.invoke("push", vec![CallValue::int(1)]).unwrap().as_i64(), Some(6));
}

#[test]
fn test_argument_rewrites_reach_the_target() {
    struct Doubler;
    impl Interceptor for Doubler {
        fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()> {
            let doubled = invocation.arg(0).and_then(CallValue::as_i64).unwrap_or(0) * 2;
            invocation.set_arg(0, CallValue::int(doubled))?;
            invocation.proceed()
        }
    }

    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(&log, vec![Arc::new(Doubler)]);

    let out = proxy.invoke("push", vec![CallValue::int(3)]).unwrap();
    assert_eq!(out.as_i64(), Some(6));
}

#[test]
fn test_out_of_range_argument_is_reported() {
    struct Wild;
    impl Interceptor for Wild {
        fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()> {
            invocation.set_arg(7, CallValue::int(0))?;
            invocation.proceed()
        }
    }

    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(&log, vec![Arc::new(Wild)]);

    let err = proxy.invoke("push", vec![CallValue::int(1)]).unwrap_err();
    assert!(matches!(
        err,
        CallError::ArgumentIndex { index: 7, count: 1, .. }
    ));
}

// ============================================================================
// Short-circuiting
// ============================================================================

#[test]
fn test_short_circuit_skips_the_target() {
    struct Cached {
        value: i64,
    }
    impl Interceptor for Cached {
        fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()> {
            invocation.set_return_value(CallValue::int(self.value));
            Ok(())
        }
    }

    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(&log, vec![Arc::new(Cached { value: 99 })]);

    let out = proxy.invoke("push", vec![CallValue::int(1)]).unwrap();
    assert_eq!(out.as_i64(), Some(99));
    assert!(log.lock().is_empty(), "target must not run on a short-circuit");
}

#[test]
fn test_short_circuit_without_value_fails_typed_members() {
    struct Swallow;
    impl Interceptor for Swallow {
        fn intercept(&self, _invocation: &mut dyn Invocation) -> CallResult<()> {
            Ok(())
        }
    }

    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(&log, vec![Arc::new(Swallow)]);

    let err = proxy.invoke("push", vec![CallValue::int(1)]).unwrap_err();
    assert!(matches!(err, CallError::ReturnType { .. }));
}

#[test]
fn test_replaced_return_value_must_match_member_type() {
    struct Corrupt;
    impl Interceptor for Corrupt {
        fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()> {
            invocation.proceed()?;
            invocation.set_return_value(CallValue::string("not a number"));
            Ok(())
        }
    }

    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(&log, vec![Arc::new(Corrupt)]);

    let err = proxy.invoke("push", vec![CallValue::int(1)]).unwrap_err();
    assert!(matches!(err, CallError::ReturnType { member, .. } if member == "push"));
}

// ============================================================================
// Failures and retry
// ============================================================================

#[test]
fn test_application_errors_cross_the_boundary_verbatim() {
    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(
        &log,
        vec![Arc::new(Recording { name: "trace", log: log.clone() })],
    );

    let err = proxy.invoke("fail", vec![]).unwrap_err();
    assert!(err.is_application());
    let CallError::Application(inner) = err else {
        panic!("expected an application error");
    };
    let io = inner.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
    // The interceptor still unwound.
    assert_eq!(*log.lock(), vec!["trace:enter:fail", "target:fail", "trace:exit"]);
}

#[test]
fn test_retry_resumes_without_reentering_earlier_interceptors() {
    #[derive(Default)]
    struct FlakyGate {
        attempts: AtomicUsize,
        enters: AtomicUsize,
    }
    struct Retry;
    impl Interceptor for Retry {
        fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()> {
            match invocation.proceed() {
                Ok(()) => Ok(()),
                Err(_) => invocation.proceed(),
            }
        }
    }
    struct Counting {
        enters: Arc<AtomicUsize>,
    }
    impl Interceptor for Counting {
        fn intercept(&self, invocation: &mut dyn Invocation) -> CallResult<()> {
            self.enters.fetch_add(1, Ordering::SeqCst);
            invocation.proceed()
        }
    }

    let model = Arc::new(TypeModel::with_builtins());
    let b = model.builtins().unwrap();
    let sig = MemberSig::method("open").returns(TypeRef::Concrete(b.int));
    let class = model
        .register(
            TypeShapeBuilder::class("FlakyGate")
                .method(sig.clone(), MemberFlags::overridable())
                .bind(&sig, |target, _| {
                    let gate = target.downcast_ref::<FlakyGate>().unwrap();
                    if gate.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(CallError::application(std::io::Error::other("first try")))
                    } else {
                        Ok(CallValue::int(
                            gate.attempts.load(Ordering::SeqCst) as i64
                        ))
                    }
                })
                .factory(|| Arc::new(FlakyGate::default())),
        )
        .unwrap();

    let enters = Arc::new(AtomicUsize::new(0));
    let engine = ProxyEngine::new(model);
    let proxy = engine
        .create_class_proxy(
            class,
            GenerationOptions::new(),
            vec![
                Arc::new(Counting { enters: enters.clone() }),
                Arc::new(Retry),
            ],
        )
        .unwrap();

    let out = proxy.invoke("open", vec![]).unwrap();
    assert_eq!(out.as_i64(), Some(2), "target ran twice");
    assert_eq!(
        enters.load(Ordering::SeqCst),
        1,
        "the interceptor before the retrying one must not run again"
    );
}

#[test]
fn test_targetless_chain_exhaustion_reports_no_target() {
    let model = Arc::new(TypeModel::with_builtins());
    let b = model.builtins().unwrap();
    let iface = model
        .register(
            TypeShapeBuilder::interface("IGate").method(
                MemberSig::method("enter").returns(TypeRef::Concrete(b.int)),
                MemberFlags::overridable(),
            ),
        )
        .unwrap();

    let log: CallLog = Arc::default();
    let engine = ProxyEngine::new(model);
    let proxy = engine
        .create_interface_proxy_without_target(
            iface,
            GenerationOptions::new(),
            vec![Arc::new(Recording { name: "trace", log: log.clone() })],
        )
        .unwrap();

    let err = proxy.invoke("enter", vec![]).unwrap_err();
    assert!(matches!(err, CallError::NoTarget { member } if member == "enter"));
}

// ============================================================================
// Properties and events
// ============================================================================

#[test]
fn test_properties_dispatch_through_the_chain() {
    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(
        &log,
        vec![Arc::new(Recording { name: "trace", log: log.clone() })],
    );

    proxy.set("label", CallValue::string("west gate")).unwrap();
    let label = proxy.get("label").unwrap();
    assert_eq!(label.as_str(), Some("west gate"));

    let entries = log.lock();
    assert!(entries.contains(&"trace:enter:set_label".to_string()));
    assert!(entries.contains(&"trace:enter:get_label".to_string()));
    assert!(entries.contains(&"target:set_label".to_string()));
    assert!(entries.contains(&"target:get_label".to_string()));
}

#[test]
fn test_events_dispatch_through_the_chain() {
    let log: CallLog = Arc::default();
    let (_engine, proxy) = proxy_with(
        &log,
        vec![Arc::new(Recording { name: "trace", log: log.clone() })],
    );

    proxy.add_handler("clicked", CallValue::int(41)).unwrap();
    proxy.add_handler("clicked", CallValue::int(42)).unwrap();
    proxy.remove_handler("clicked", CallValue::int(41)).unwrap();

    let target = proxy.target().unwrap();
    let turnstile = target.instance.downcast_ref::<Turnstile>().unwrap();
    assert_eq!(turnstile.handlers.load(Ordering::SeqCst), 1);

    let entries = log.lock();
    assert_eq!(
        entries.iter().filter(|line| *line == "trace:enter:add_clicked").count(),
        2
    );
    assert_eq!(
        entries.iter().filter(|line| *line == "trace:enter:remove_clicked").count(),
        1
    );
}
