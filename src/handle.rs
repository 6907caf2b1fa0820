//! Ownership-tracking wrapper for runtime object references.

use std::fmt;

use tracing::trace;

use crate::vm::{RawObj, Vm};

/// An owning wrapper around one runtime object reference.
///
/// A non-null `Handle` represents exactly one share of the object's
/// reference count, released exactly once when the handle is dropped,
/// reassigned, or explicitly released. The asymmetric ownership contracts of
/// the raw [`Vm`] API are made explicit by the constructors:
///
/// - [`Handle::adopt`] wraps a reference the caller already owns (every raw
///   call whose contract says "caller owns") without touching the count;
/// - [`Handle::acquire`] turns a *borrowed* reference (such as the result of
///   [`Vm::tuple_get`]) into an owned one by incrementing;
/// - [`Clone`] produces an independent co-owner (one increment);
/// - [`Handle::into_raw`] surrenders the share without decrementing, for
///   feeding APIs that steal ownership ([`Vm::tuple_set`]).
///
/// Rust's move semantics supply the rest: moving a handle transfers the
/// share without any count traffic, and assignment drops (releases) the
/// destination's previous value.
///
/// A handle is never an error carrier. Fallible raw calls hand back the null
/// reference; adopting it yields an empty handle, and the caller consults
/// [`Vm::take_fault`] for the diagnostic.
///
/// Handles borrow the [`Vm`], so the borrow checker guarantees every handle
/// is gone before the session can be finalized.
///
/// # Example
///
/// ```
/// use curlew::{Handle, Session, SessionOptions};
///
/// let session = Session::initialize(SessionOptions::default())?;
/// let vm = session.vm();
///
/// let value = Handle::adopt(vm, vm.str_new("hello")).with_label("greeting");
/// let count = vm.refcount(value.raw());
///
/// let copy = value.clone(); // independent co-owner, count + 1
/// drop(copy); // count back to its previous value
/// assert_eq!(vm.refcount(value.raw()), count);
///
/// drop(value);
/// session.finalize()?;
/// # Ok::<(), curlew::Error>(())
/// ```
pub struct Handle<'vm> {
    vm: &'vm Vm,
    raw: RawObj,
    label: Option<String>,
}

impl<'vm> Handle<'vm> {
    /// Wrap a reference the caller already owns. No count mutation: the
    /// caller's ownership transfers into the handle, which becomes the sole
    /// owner. Adopting the null reference yields an empty handle.
    pub fn adopt(vm: &'vm Vm, raw: RawObj) -> Self {
        Self {
            vm,
            raw,
            label: None,
        }
    }

    /// Take a *borrowed* reference and increment to become an independent
    /// owner. This is the only correct way to keep a reference obtained
    /// from a borrowing API (e.g. reading a tuple slot) beyond the lender's
    /// lifetime. Returns `None` if the reference is null or stale.
    pub fn acquire(vm: &'vm Vm, raw: RawObj) -> Option<Self> {
        if !raw.is_valid() {
            return None;
        }
        let count = vm.incref(raw)?;
        trace!(obj = %raw, count, "acquired borrowed reference");
        Some(Self {
            vm,
            raw,
            label: None,
        })
    }

    /// Attach a diagnostic label. Purely observational: labels only show up
    /// in trace events for reference-count transitions.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the diagnostic label on an existing handle.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// The diagnostic label, if one was attached.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether the handle holds a non-null reference.
    pub fn is_valid(&self) -> bool {
        self.raw.is_valid()
    }

    /// Non-owning peek at the wrapped reference. The result must not be
    /// stored past this handle's lifetime.
    pub fn raw(&self) -> RawObj {
        self.raw
    }

    /// Surrender the share without decrementing: the explicit move-out that
    /// feeds ownership-stealing APIs. The handle is consumed; releasing the
    /// share becomes the receiver's responsibility.
    pub fn into_raw(mut self) -> RawObj {
        let raw = std::mem::replace(&mut self.raw, RawObj::invalid());
        if raw.is_valid() {
            trace!(
                obj = %raw,
                label = self.label.as_deref().unwrap_or(""),
                "ownership surrendered"
            );
        }
        raw
    }

    /// Release the share now instead of at scope exit. The handle becomes
    /// empty; releasing again is a no-op.
    pub fn release(&mut self) {
        let raw = std::mem::replace(&mut self.raw, RawObj::invalid());
        if raw.is_valid() {
            let count = self.vm.decref(raw);
            trace!(
                obj = %raw,
                count = count.unwrap_or(0),
                label = self.label.as_deref().unwrap_or(""),
                "released reference"
            );
        }
    }
}

impl Clone for Handle<'_> {
    /// Produce an independent co-owner: one increment on the underlying
    /// count. Cloning an empty handle yields another empty handle.
    fn clone(&self) -> Self {
        if self.raw.is_valid() {
            let count = self.vm.incref(self.raw);
            trace!(
                obj = %self.raw,
                count = count.unwrap_or(0),
                label = self.label.as_deref().unwrap_or(""),
                "incremented reference"
            );
        }
        Self {
            vm: self.vm,
            raw: self.raw,
            label: self.label.clone(),
        }
    }
}

impl Drop for Handle<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Handle");
        debug.field("raw", &self.raw);
        if let Some(label) = &self.label {
            debug.field("label", label);
        }
        debug.finish()
    }
}
