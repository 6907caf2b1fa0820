//! Invocation pipeline scenarios, including leak-freedom on failure paths.

use curlew::{Builtin, Error, FaultKind, ModuleSpec, Scalar, Session, SessionOptions};

fn demo_session() -> Session {
    Session::initialize(SessionOptions {
        modules: vec![ModuleSpec::new("demo")
            .function("add", Builtin::Add)
            .function("sub", Builtin::Sub)
            .function("join", Builtin::Concat)
            .function("eq", Builtin::Eq)
            .constant("not_a_function", 42i64)],
        ..Default::default()
    })
    .expect("session should initialize")
}

#[test]
fn test_add_two_ints() {
    let session = demo_session();
    let result = session.call("demo", "add").arg(3).arg(4).invoke().expect("demo.add");
    assert_eq!(result, Scalar::Int(7));
    assert!(
        session.take_fault().is_none(),
        "a successful pipeline leaves no pending fault"
    );
    session.finalize().expect("clean finalize");
}

#[test]
fn test_mixed_arguments_widen_to_float() {
    let session = demo_session();
    let result = session
        .call("demo", "add")
        .arg(1)
        .arg(2.5)
        .invoke()
        .expect("demo.add");
    assert_eq!(result, Scalar::Float(3.5));
    session.finalize().expect("clean finalize");
}

#[test]
fn test_string_arguments() {
    let session = demo_session();
    let result = session
        .call("demo", "join")
        .args([Scalar::from("fox"), Scalar::from("trot")])
        .invoke()
        .expect("demo.join");
    assert_eq!(result, Scalar::Str("foxtrot".into()));
    session.finalize().expect("clean finalize");
}

#[test]
fn test_large_int_arguments_compare_exactly() {
    let session = demo_session();
    let result = session
        .call("demo", "eq")
        .arg(9_007_199_254_740_993i64)
        .arg(9_007_199_254_740_992i64)
        .invoke()
        .expect("demo.eq");
    assert_eq!(
        result,
        Scalar::Bool(false),
        "integers one apart must not compare equal"
    );
    session.finalize().expect("clean finalize");
}

#[test]
fn test_zero_arguments_build_an_empty_container() {
    let session = demo_session();
    let result = session.call("demo", "add").invoke().expect("demo.add with no args");
    assert_eq!(result, Scalar::Int(0));
    session.finalize().expect("clean finalize");
}

#[test]
fn test_missing_module_is_an_import_failure() {
    let session = demo_session();
    let before = session.vm().live_objects();

    let err = session
        .call("missing_module", "anything")
        .invoke()
        .expect_err("import must fail");
    match &err {
        Error::Import { module, detail } => {
            assert_eq!(module, "missing_module");
            assert!(detail.contains("module-not-found"), "unexpected detail: {detail}");
        }
        other => panic!("expected Import, got {other:?}"),
    }

    assert_eq!(session.vm().live_objects(), before, "the failed path must not leak");
    // The session survives the failure and remains finalizable.
    session.finalize().expect("clean finalize");
}

#[test]
fn test_undecodable_module_name_carries_fault_detail() {
    let session = demo_session();

    let err = session
        .call("demo\0extra", "add")
        .invoke()
        .expect_err("decode must fail");
    match &err {
        Error::Decode { name, detail } => {
            assert_eq!(name, "demo\0extra");
            assert!(detail.contains("decode"), "unexpected detail: {detail}");
        }
        other => panic!("expected Decode, got {other:?}"),
    }
    assert!(
        session.take_fault().is_none(),
        "the pipeline drains the fault into the error"
    );
    session.finalize().expect("clean finalize");
}

#[test]
fn test_absent_attribute_is_attribute_missing() {
    let session = demo_session();
    let before = session.vm().live_objects();

    let err = session
        .call("demo", "mystery")
        .invoke()
        .expect_err("lookup must fail");
    match &err {
        Error::AttributeMissing { module, attribute, detail } => {
            assert_eq!(module, "demo");
            assert_eq!(attribute, "mystery");
            assert!(detail.contains("no-attribute"), "unexpected detail: {detail}");
        }
        other => panic!("expected AttributeMissing, got {other:?}"),
    }

    assert_eq!(session.vm().live_objects(), before);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_constant_attribute_is_not_invocable() {
    let session = demo_session();
    let before = session.vm().live_objects();

    let err = session
        .call("demo", "not_a_function")
        .invoke()
        .expect_err("constants cannot be called");
    assert!(err.is_not_invocable());
    assert!(
        err.to_string().contains("not_a_function"),
        "diagnostic names the attribute: {err}"
    );
    assert!(
        session.take_fault().is_none(),
        "any latent fault was drained before reporting"
    );

    assert_eq!(session.vm().live_objects(), before);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_wrong_arity_is_a_call_failure() {
    let session = demo_session();
    let before = session.vm().live_objects();

    let err = session
        .call("demo", "sub")
        .arg(1)
        .invoke()
        .expect_err("sub takes two arguments");
    match &err {
        Error::CallFailure { function, detail } => {
            assert_eq!(function, "demo.sub");
            assert!(detail.contains("arity"), "unexpected detail: {detail}");
        }
        other => panic!("expected CallFailure, got {other:?}"),
    }

    assert_eq!(session.vm().live_objects(), before);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_type_mismatch_is_a_call_failure() {
    let session = demo_session();
    let err = session
        .call("demo", "add")
        .arg(1)
        .arg("two")
        .invoke()
        .expect_err("add rejects strings");
    assert!(err.is_call_failure());
    session.finalize().expect("clean finalize");
}

#[test]
fn test_failed_insertion_does_not_leak_the_stolen_value() {
    // Exercised through the raw API: the pipeline never produces a bad
    // index itself, but the steal-on-failure contract it relies on must
    // hold.
    let session = demo_session();
    let vm = session.vm();
    let before = vm.live_objects();

    let tuple = vm.tuple_new(1);
    let value = vm.str_new("stolen");
    assert!(!vm.tuple_set(tuple, 7, value));
    assert_eq!(vm.take_fault().expect("index fault").kind, FaultKind::Index);

    vm.decref(tuple);
    assert_eq!(vm.live_objects(), before, "the runtime released the stolen share");
    session.finalize().expect("clean finalize");
}

#[test]
fn test_session_reuse_after_failures() {
    let session = demo_session();

    assert!(session.call("nowhere", "nothing").invoke().is_err());
    let result = session.call("demo", "add").arg(2).arg(2).invoke().expect("demo.add");
    assert_eq!(result, Scalar::Int(4));

    assert!(session.call("demo", "mystery").invoke().is_err());
    let result = session.call("demo", "sub").arg(9).arg(5).invoke().expect("demo.sub");
    assert_eq!(result, Scalar::Int(4));

    session.finalize().expect("clean finalize");
}
