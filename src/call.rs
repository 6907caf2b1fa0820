//! The invocation pipeline.

use tracing::debug;

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::types::Scalar;
use crate::vm::Vm;

/// One invocation of a module function.
///
/// Built by [`Session::call`](crate::Session::call), then fed positional
/// arguments and run with [`invoke`](Call::invoke). The pipeline resolves
/// the module, resolves the callable, marshals the arguments into a tuple,
/// performs the call, and marshals the result back. Each step checks its
/// own result for null and drains the runtime's pending fault into the
/// returned [`Error`] on failure.
///
/// Every runtime reference the pipeline touches lives in a [`Handle`] local
/// to one of these steps, so all shares are released on scope exit no
/// matter which branch exits: success, or any of the failure paths.
///
/// # Example
///
/// ```
/// use curlew::{Builtin, ModuleSpec, Scalar, Session, SessionOptions};
///
/// let options = SessionOptions {
///     modules: vec![ModuleSpec::new("demo").function("concat", Builtin::Concat)],
///     ..Default::default()
/// };
/// let session = Session::initialize(options)?;
///
/// let result = session
///     .call("demo", "concat")
///     .arg("foo")
///     .arg("bar")
///     .invoke()?;
/// assert_eq!(result, Scalar::Str("foobar".into()));
/// # session.finalize()?;
/// # Ok::<(), curlew::Error>(())
/// ```
pub struct Call<'vm> {
    vm: &'vm Vm,
    module: String,
    function: String,
    args: Vec<Scalar>,
}

impl<'vm> Call<'vm> {
    pub(crate) fn new(vm: &'vm Vm, module: &str, function: &str) -> Self {
        Self {
            vm,
            module: module.to_string(),
            function: function.to_string(),
            args: Vec::new(),
        }
    }

    /// Append one positional argument.
    pub fn arg(mut self, value: impl Into<Scalar>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append positional arguments in order.
    pub fn args<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Scalar>,
    {
        self.args.extend(values);
        self
    }

    /// Run the pipeline.
    pub fn invoke(self) -> Result<Scalar> {
        debug!(module = %self.module, function = %self.function, argc = self.args.len(), "invoking");
        let module = self.resolve_module()?;
        let callable = self.resolve_callable(&module)?;
        let arguments = self.build_arguments()?;
        let result = self.call_callable(&callable, &arguments)?;
        self.extract(&result)
    }

    fn qualified(&self) -> String {
        format!("{}.{}", self.module, self.function)
    }

    fn resolve_module(&self) -> Result<Handle<'vm>> {
        let module = {
            // The encoded name is only needed for the import itself; the
            // nested block releases it before anything else runs.
            let name =
                Handle::adopt(self.vm, self.vm.str_decode(&self.module)).with_label("module name");
            if !name.is_valid() {
                return Err(Error::Decode {
                    name: self.module.clone(),
                    detail: drain_fault(self.vm),
                });
            }
            Handle::adopt(self.vm, self.vm.import(name.raw())).with_label("module")
        };
        if !module.is_valid() {
            return Err(Error::Import {
                module: self.module.clone(),
                detail: drain_fault(self.vm),
            });
        }
        Ok(module)
    }

    fn resolve_callable(&self, module: &Handle<'vm>) -> Result<Handle<'vm>> {
        let callable = Handle::adopt(self.vm, self.vm.attr_get(module.raw(), &self.function))
            .with_label("callable");
        if !callable.is_valid() {
            return Err(Error::AttributeMissing {
                module: self.module.clone(),
                attribute: self.function.clone(),
                detail: drain_fault(self.vm),
            });
        }
        if !self.vm.is_callable(callable.raw()) {
            // The lookup itself succeeded, but a distinct earlier fault may
            // still be latent; drain it so it cannot leak into the next
            // fallible call.
            if let Some(fault) = self.vm.take_fault() {
                debug!(%fault, "drained latent fault while reporting non-callable attribute");
            }
            return Err(Error::NotInvocable {
                module: self.module.clone(),
                attribute: self.function.clone(),
            });
        }
        Ok(callable)
    }

    fn build_arguments(&self) -> Result<Handle<'vm>> {
        let tuple = Handle::adopt(self.vm, self.vm.tuple_new(self.args.len()))
            .with_label("argument container");
        if !tuple.is_valid() {
            return Err(Error::ArgumentConversion(format!(
                "cannot allocate a container for {} argument(s): {}",
                self.args.len(),
                drain_fault(self.vm)
            )));
        }
        for (index, value) in self.args.iter().enumerate() {
            let converted = Handle::adopt(self.vm, value.to_object(self.vm))
                .with_label(format!("argument {index}"));
            if !converted.is_valid() {
                return Err(Error::ArgumentConversion(format!(
                    "argument {index} ({value}): {}",
                    drain_fault(self.vm)
                )));
            }
            // Insertion steals the share even on failure, so the handle
            // must surrender before the call; the runtime releases the
            // value itself if the insertion fails.
            if !self.vm.tuple_set(tuple.raw(), index, converted.into_raw()) {
                return Err(Error::ArgumentConversion(format!(
                    "argument {index}: {}",
                    drain_fault(self.vm)
                )));
            }
        }
        Ok(tuple)
    }

    fn call_callable(
        &self,
        callable: &Handle<'vm>,
        arguments: &Handle<'vm>,
    ) -> Result<Handle<'vm>> {
        let result = Handle::adopt(self.vm, self.vm.call(callable.raw(), arguments.raw()))
            .with_label("result");
        if !result.is_valid() {
            return Err(Error::CallFailure {
                function: self.qualified(),
                detail: drain_fault(self.vm),
            });
        }
        Ok(result)
    }

    fn extract(&self, result: &Handle<'vm>) -> Result<Scalar> {
        match Scalar::from_object(self.vm, result.raw()) {
            Some(value) => {
                debug!(function = %self.qualified(), %value, "invocation succeeded");
                Ok(value)
            }
            None => Err(Error::CallFailure {
                function: self.qualified(),
                detail: format!(
                    "call returned a non-scalar {}",
                    self.vm.type_name(result.raw()).unwrap_or("stale reference")
                ),
            }),
        }
    }
}

fn drain_fault(vm: &Vm) -> String {
    match vm.take_fault() {
        Some(fault) => fault.to_string(),
        None => "no pending fault".to_string(),
    }
}
