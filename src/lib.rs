//! An embedded reference-counted object runtime with a safe ownership layer.
//!
//! The `vm` module hosts a small runtime whose API is deliberately
//! low-level: manual reference counts, a pending-fault slot that must be
//! polled explicitly, and ownership-transfer rules that differ per call
//! (some return owned references, some borrowed ones, and tuple insertion
//! steals its argument even on failure). The rest of the crate is the safe
//! layer that makes those rules impossible to get wrong: [`Handle`] binds
//! each reference-count share to a scope, [`Session`] owns the runtime's
//! lifecycle, and [`Call`] runs the module → callable → arguments → call →
//! result pipeline with every share accounted for on every exit path.
//!
//! # Example
//!
//! ```
//! use curlew::{Builtin, ModuleSpec, Scalar, Session, SessionOptions};
//!
//! fn main() -> curlew::Result<()> {
//!     // Modules are registered before the runtime starts.
//!     let options = SessionOptions {
//!         modules: vec![ModuleSpec::new("demo")
//!             .function("add", Builtin::Add)
//!             .constant("answer", 42i64)],
//!         ..Default::default()
//!     };
//!     let session = Session::initialize(options)?;
//!
//!     // Resolve demo.add, marshal the arguments, call, marshal back.
//!     let sum = session.call("demo", "add").arg(3).arg(4).invoke()?;
//!     assert_eq!(sum, Scalar::Int(7));
//!
//!     // Finalize audits the heap: leaked shares turn into an error.
//!     session.finalize()
//! }
//! ```
//!
//! Modules can also live on disk as declarative `<name>.toml` manifests
//! found through [`SessionOptions::search_path`]; see the
//! [`vm`](crate::vm) module docs for the manifest format and the full
//! ownership-contract table.

pub mod call;
pub mod error;
pub mod handle;
pub mod session;
pub mod types;
pub mod vm;

// Re-export main types at the crate root
pub use call::Call;
pub use error::{Error, Result};
pub use handle::Handle;
pub use session::{Session, SessionOptions};
pub use types::Scalar;
pub use vm::{Builtin, Fault, FaultKind, ModuleSpec, RawObj, Vm};
