//! End-to-end: registered modules, on-disk manifests, session reuse.

use std::fs;

use curlew::{Builtin, ModuleSpec, Scalar, Session, SessionOptions};

#[test]
fn test_full_lifecycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("calc.toml"),
        r#"
        [functions]
        add = "add"
        mul = "mul"
        biggest = "max"

        [constants]
        answer = 42
        scale = 2.5
        "#,
    )
    .expect("write manifest");

    let session = Session::initialize(SessionOptions {
        search_path: vec![dir.path().to_path_buf()],
        modules: vec![ModuleSpec::new("demo")
            .function("add", Builtin::Add)
            .function("join", Builtin::Concat)],
        program_name: Some("integration".to_string()),
        ..Default::default()
    })
    .expect("session should initialize");

    // Registered module.
    let sum = session.call("demo", "add").arg(3).arg(4).invoke().expect("demo.add");
    assert_eq!(sum, Scalar::Int(7));

    // Manifest module from the search path.
    let product = session
        .call("calc", "mul")
        .arg(6)
        .arg(7)
        .invoke()
        .expect("calc.mul");
    assert_eq!(product, Scalar::Int(42));

    // The manifest is cached: repeated imports must not grow the heap.
    let after_first = session.vm().live_objects();
    for _ in 0..3 {
        let biggest = session
            .call("calc", "biggest")
            .args([Scalar::Int(1), Scalar::Int(9), Scalar::Int(5)])
            .invoke()
            .expect("calc.biggest");
        assert_eq!(biggest, Scalar::Int(9));
    }
    assert_eq!(session.vm().live_objects(), after_first);

    // Failures in between leave the session reusable.
    assert!(session.call("calc", "divide").invoke().is_err());
    assert!(session.call("ghost", "anything").invoke().is_err());
    let joined = session
        .call("demo", "join")
        .arg("still ")
        .arg("working")
        .invoke()
        .expect("demo.join");
    assert_eq!(joined, Scalar::Str("still working".into()));

    session.finalize().expect("clean finalize after mixed traffic");
}

#[test]
fn test_command_line_style_arguments() {
    let session = Session::initialize(SessionOptions {
        modules: vec![ModuleSpec::new("demo").function("add", Builtin::Add)],
        ..Default::default()
    })
    .expect("session should initialize");

    // What the binary does with its argv tail.
    let argv = ["3", "4"];
    let mut call = session.call("demo", "add");
    for raw in argv {
        call = call.arg(Scalar::parse(raw));
    }
    assert_eq!(call.invoke().expect("demo.add"), Scalar::Int(7));

    session.finalize().expect("clean finalize");
}
