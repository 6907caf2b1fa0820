//! Basic example demonstrating the curlew runtime and its ownership layer.
//!
//! Run with: cargo run --example basic

use curlew::{Builtin, Handle, ModuleSpec, Scalar, Session, SessionOptions};

fn main() -> curlew::Result<()> {
    // Trace level shows every reference-count transition.
    tracing_subscriber::fmt()
        .compact()
        .without_time()
        .with_target(false)
        .with_max_level(tracing::Level::TRACE)
        .init();

    // Register a module before the runtime starts.
    let options = SessionOptions {
        modules: vec![ModuleSpec::new("demo")
            .function("add", Builtin::Add)
            .function("join", Builtin::Concat)
            .constant("greeting", "hello")],
        program_name: Some("basic".to_string()),
        ..Default::default()
    };
    let session = Session::initialize(options)?;
    let vm = session.vm();

    println!("live objects at start: {}", vm.live_objects());

    // The invocation pipeline end to end.
    let sum = session.call("demo", "add").arg(3).arg(4).invoke()?;
    println!("demo.add(3, 4) = {sum}");

    let joined = session
        .call("demo", "join")
        .arg("fox")
        .arg("trot")
        .invoke()?;
    println!("demo.join(\"fox\", \"trot\") = {joined}");

    // Constants resolve but are not callable.
    match session.call("demo", "greeting").invoke() {
        Err(err) => println!("calling a constant fails as expected: {err}"),
        Ok(value) => println!("unexpected success: {value}"),
    }

    // Handles make the ownership rules visible.
    let value = Handle::adopt(vm, vm.str_new("watched")).with_label("watched");
    println!("one owner: refcount = {:?}", vm.refcount(value.raw()));
    {
        let copy = value.clone();
        println!("two owners: refcount = {:?}", vm.refcount(copy.raw()));
    }
    println!("back to one owner: refcount = {:?}", vm.refcount(value.raw()));
    drop(value);

    // Scalars round-trip through runtime objects.
    let pi = Handle::adopt(vm, Scalar::Float(3.5).to_object(vm));
    println!("marshaled back: {:?}", Scalar::from_object(vm, pi.raw()));
    drop(pi);

    println!("live objects before finalize: {}", vm.live_objects());
    session.finalize()
}
