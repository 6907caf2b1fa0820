//! Reference-count ownership properties of `Handle`.

use curlew::{Handle, Session, SessionOptions};
use proptest::prelude::*;

fn session() -> Session {
    Session::initialize(SessionOptions::default()).expect("session should initialize")
}

#[test]
fn test_adopt_then_drop_returns_to_baseline() {
    let session = session();
    let vm = session.vm();
    let baseline = vm.live_objects();

    {
        let handle = Handle::adopt(vm, vm.str_new("ephemeral"));
        assert!(handle.is_valid());
        assert_eq!(vm.live_objects(), baseline + 1);
        assert_eq!(vm.refcount(handle.raw()), Some(1));
    }

    assert_eq!(vm.live_objects(), baseline);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_clone_increments_by_exactly_one() {
    let session = session();
    let vm = session.vm();

    let original = Handle::adopt(vm, vm.str_new("shared")).with_label("original");
    assert_eq!(vm.refcount(original.raw()), Some(1));

    let copy = original.clone();
    assert_eq!(vm.refcount(original.raw()), Some(2));
    assert_eq!(copy.raw(), original.raw(), "copy co-owns the same object");

    drop(copy);
    assert_eq!(vm.refcount(original.raw()), Some(1));

    drop(original);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_move_never_changes_the_count() {
    let session = session();
    let vm = session.vm();

    let first = Handle::adopt(vm, vm.str_new("moved"));
    let raw = first.raw();
    assert_eq!(vm.refcount(raw), Some(1));

    let second = first;
    assert_eq!(vm.refcount(raw), Some(1), "a move is not a copy");
    assert_eq!(second.raw(), raw);

    drop(second);
    assert_eq!(vm.refcount(raw), None, "single release after the move chain");
    session.finalize().expect("clean finalize");
}

#[test]
fn test_reassignment_releases_the_destination() {
    let session = session();
    let vm = session.vm();
    let baseline = vm.live_objects();

    let mut handle = Handle::adopt(vm, vm.str_new("first"));
    let first_raw = handle.raw();
    handle = Handle::adopt(vm, vm.str_new("second"));

    assert_eq!(vm.refcount(first_raw), None, "old value released on assign");
    assert_eq!(vm.live_objects(), baseline + 1);

    drop(handle);
    assert_eq!(vm.live_objects(), baseline);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_into_raw_surrenders_without_decrementing() {
    let session = session();
    let vm = session.vm();

    let handle = Handle::adopt(vm, vm.str_new("surrendered"));
    let raw = handle.into_raw();
    assert_eq!(vm.refcount(raw), Some(1), "surrender must not release");

    // The share is now ours to release by hand.
    vm.decref(raw);
    assert_eq!(vm.refcount(raw), None);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_release_is_idempotent() {
    let session = session();
    let vm = session.vm();
    let baseline = vm.live_objects();

    let mut handle = Handle::adopt(vm, vm.str_new("released early"));
    handle.release();
    assert!(!handle.is_valid());
    assert_eq!(vm.live_objects(), baseline);

    // A second release and the eventual drop are both no-ops.
    handle.release();
    drop(handle);
    assert_eq!(vm.live_objects(), baseline);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_acquire_turns_a_borrowed_reference_into_an_owner() {
    let session = session();
    let vm = session.vm();

    let tuple = Handle::adopt(vm, vm.tuple_new(1));
    let value = Handle::adopt(vm, vm.str_new("inside"));
    assert!(vm.tuple_set(tuple.raw(), 0, value.into_raw()));

    let borrowed = vm.tuple_get(tuple.raw(), 0);
    assert_eq!(vm.refcount(borrowed), Some(1), "borrow creates no share");

    let owner = Handle::acquire(vm, borrowed).expect("live reference");
    assert_eq!(vm.refcount(borrowed), Some(2));

    // The acquired owner keeps the value alive past the container.
    drop(tuple);
    assert_eq!(vm.refcount(owner.raw()), Some(1));

    drop(owner);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_acquire_rejects_null_and_stale_references() {
    let session = session();
    let vm = session.vm();

    assert!(Handle::acquire(vm, curlew::RawObj::invalid()).is_none());

    let stale = {
        let handle = Handle::adopt(vm, vm.str_new("gone"));
        handle.raw()
    };
    assert!(Handle::acquire(vm, stale).is_none());
    session.finalize().expect("clean finalize");
}

#[test]
fn test_labels_are_observational_only() {
    let session = session();
    let vm = session.vm();

    let mut handle = Handle::adopt(vm, vm.str_new("tagged")).with_label("first tag");
    assert_eq!(handle.label(), Some("first tag"));
    assert_eq!(vm.refcount(handle.raw()), Some(1));

    handle.set_label("second tag");
    assert_eq!(handle.label(), Some("second tag"));
    assert_eq!(vm.refcount(handle.raw()), Some(1));

    drop(handle);
    session.finalize().expect("clean finalize");
}

#[test]
fn test_leaked_share_fails_the_finalize_audit() {
    let session = session();
    let vm = session.vm();

    let handle = Handle::adopt(vm, vm.str_new("never released"));
    let _ = handle.into_raw(); // surrendered and forgotten

    let err = session.finalize().expect_err("audit must catch the leak");
    assert!(err.is_finalize());
    assert!(err.to_string().contains("str"), "leak names the type: {err}");
}

proptest! {
    /// For any sequence of clone/release/drop operations, the count always
    /// equals one share per live owner, and returns to baseline when the
    /// owners are gone.
    #[test]
    fn prop_refcount_tracks_live_owners(ops in proptest::collection::vec(0u8..3, 0..40)) {
        let session = session();
        let vm = session.vm();

        let anchor = Handle::adopt(vm, vm.str_new("anchored"));
        let raw = anchor.raw();
        let mut copies = Vec::new();

        for op in ops {
            match op {
                0 => copies.push(anchor.clone()),
                1 => {
                    if !copies.is_empty() {
                        let middle = copies.len() / 2;
                        drop(copies.remove(middle));
                    }
                }
                _ => {
                    if let Some(last) = copies.last_mut() {
                        last.release();
                    }
                }
            }
            let owners = 1 + copies.iter().filter(|copy| copy.is_valid()).count() as u32;
            prop_assert_eq!(vm.refcount(raw), Some(owners));
        }

        drop(copies);
        prop_assert_eq!(vm.refcount(raw), Some(1));
        drop(anchor);
        prop_assert_eq!(vm.refcount(raw), None);
        session.finalize().expect("clean finalize");
    }
}
