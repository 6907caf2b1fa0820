//! Runtime session lifecycle.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::call::Call;
use crate::error::{Error, Result};
use crate::vm::{Fault, ModuleSpec, Vm};

/// Options for initializing a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Directories scanned for `<name>.toml` module manifests, in order.
    pub search_path: Vec<PathBuf>,
    /// Modules registered before the runtime starts. Registration is only
    /// possible here; a running session resolves everything else through
    /// the search path.
    pub modules: Vec<ModuleSpec>,
    /// Maximum number of live runtime objects (None for unlimited).
    pub heap_capacity: Option<usize>,
    /// Name used to tag this session's diagnostics.
    pub program_name: Option<String>,
}

/// A running embedded runtime.
///
/// The session owns the runtime exclusively: it is `Send` but not `Sync`,
/// so all entry into the runtime is serialized by ownership. Handles borrow
/// the runtime through [`Session::vm`], which also means the borrow checker
/// proves every handle is released before [`Session::finalize`] can run.
///
/// A failed invocation leaves the session intact; it can keep serving
/// invocations until it is finalized.
///
/// # Example
///
/// ```
/// use curlew::{Builtin, ModuleSpec, Scalar, Session, SessionOptions};
///
/// let options = SessionOptions {
///     modules: vec![ModuleSpec::new("demo").function("add", Builtin::Add)],
///     ..Default::default()
/// };
/// let session = Session::initialize(options)?;
///
/// let sum = session.call("demo", "add").arg(3).arg(4).invoke()?;
/// assert_eq!(sum, Scalar::Int(7));
///
/// session.finalize()?;
/// # Ok::<(), curlew::Error>(())
/// ```
pub struct Session {
    vm: Vm,
    program_name: String,
}

impl Session {
    /// Start the runtime and register the configured modules.
    pub fn initialize(options: SessionOptions) -> Result<Session> {
        let vm = Vm::new(options.heap_capacity).map_err(config_error)?;
        for spec in &options.modules {
            vm.register_module(spec).map_err(config_error)?;
        }
        vm.set_search_path(options.search_path);
        let program_name = options
            .program_name
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        debug!(program = %program_name, "session initialized");
        Ok(Session { vm, program_name })
    }

    /// The runtime this session owns. Handles created against it borrow
    /// the session.
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// The name this session's diagnostics are tagged with.
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// Replace the module search path.
    pub fn set_search_path<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.vm
            .set_search_path(paths.into_iter().map(Into::into).collect());
    }

    /// Drain the runtime's pending fault, if any.
    ///
    /// The runtime never surfaces faults on its own; poll this after any
    /// fallible raw call, before the next call can overwrite the slot. The
    /// pipeline does this itself for every step it runs.
    pub fn take_fault(&self) -> Option<Fault> {
        self.vm.take_fault()
    }

    /// Begin an invocation of `function` in `module`.
    pub fn call(&self, module: &str, function: &str) -> Call<'_> {
        Call::new(&self.vm, module, function)
    }

    /// Shut the runtime down and audit the heap.
    ///
    /// Consumes the session, so every outstanding [`Handle`](crate::Handle)
    /// must have been released first. Any object still live after the
    /// runtime releases its own shares is an embedder leak and turns into
    /// [`Error::Finalize`].
    pub fn finalize(self) -> Result<()> {
        let leaks = self.vm.shutdown();
        if leaks.is_empty() {
            Ok(())
        } else {
            Err(Error::Finalize(format!(
                "{} leaked object(s): {}",
                leaks.len(),
                leaks.join(", ")
            )))
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Best-effort shutdown; leaks are only reported, never surfaced.
        let leaks = self.vm.shutdown();
        if !leaks.is_empty() {
            warn!(count = leaks.len(), "session dropped with leaked objects");
        }
    }
}

fn config_error(fault: Fault) -> Error {
    Error::Config(fault.to_string())
}
