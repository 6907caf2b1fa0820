//! The embedded object runtime.
//!
//! This module is the low-level surface the safe layer wraps. It manages
//! reference counts manually and signals failure by returning a null
//! reference (or a failure status) while storing a [`Fault`] in a pending
//! slot that the caller must drain with [`Vm::take_fault`]. Users should
//! prefer the safe wrappers: [`Handle`](crate::Handle) for ownership and
//! [`Call`](crate::Call) for invocation.
//!
//! # Ownership contracts
//!
//! Every call transfers ownership according to this table and nothing else.
//! The rules are asymmetric per call, so pick the entry for the call you are
//! making rather than assuming a uniform convention.
//!
//! | operation | returns | contract |
//! |-----------|---------|----------|
//! | [`str_decode`](Vm::str_decode) | owned or null | caller owns the new reference |
//! | [`import`](Vm::import) | owned or null | borrows the name; caller owns the result; null + fault on failure |
//! | [`attr_get`](Vm::attr_get) | owned or null | caller owns; null + fault on failure |
//! | [`tuple_new`](Vm::tuple_new) | owned or null | caller owns; slots start null |
//! | [`int_new`](Vm::int_new) / [`float_new`](Vm::float_new) / [`bool_new`](Vm::bool_new) / [`str_new`](Vm::str_new) / [`none_new`](Vm::none_new) | owned or null | caller owns; cached and singleton objects still hand out a new share |
//! | [`tuple_set`](Vm::tuple_set) | status | **steals the value even on failure** (the runtime releases it itself on the failure path); releases any previous occupant |
//! | [`tuple_get`](Vm::tuple_get) | borrowed or null | never a new share; must not be released; valid only while the tuple lives |
//! | [`call`](Vm::call) | owned or null | borrows callable and arguments; caller owns the result |
//! | [`incref`](Vm::incref) / [`decref`](Vm::decref) | new count | explicit share bookkeeping; stale references are logged no-ops |
//! | [`refcount`](Vm::refcount) / [`live_objects`](Vm::live_objects) | counts | introspection only |

mod builtins;
mod fault;
mod heap;
mod manifest;
mod obj;

pub use builtins::Builtin;
pub use fault::{Fault, FaultKind};
pub use manifest::ModuleSpec;
pub use obj::RawObj;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, trace, warn};

use crate::types::Scalar;
use heap::Heap;
use obj::{FunctionDef, ModuleDef, ObjKind};

/// Integers in this inclusive range come from a preallocated cache.
const SMALL_INT_MIN: i64 = -5;
const SMALL_INT_MAX: i64 = 256;

/// The runtime: object heap, module registry, search path and pending fault.
///
/// All methods take `&self`; interior mutability keeps the type `Send` but
/// not `Sync`, so entry into the runtime is serialized by ownership rather
/// than by a lock.
pub struct Vm {
    inner: RefCell<Inner>,
}

struct Inner {
    heap: Heap,
    fault: Option<Fault>,
    /// Import name to module object; the registry owns one share of each.
    modules: BTreeMap<String, RawObj>,
    search_path: Vec<PathBuf>,
    none: RawObj,
    bools: [RawObj; 2],
    small_ints: Vec<RawObj>,
    down: bool,
}

impl Vm {
    /// Build a runtime, preallocating the singletons and the small-int
    /// cache. Fails if `heap_capacity` cannot hold the preallocations.
    pub(crate) fn new(heap_capacity: Option<usize>) -> Result<Self, Fault> {
        let mut heap = Heap::new(heap_capacity);
        let none = heap.alloc(ObjKind::None)?;
        let bools = [
            heap.alloc(ObjKind::Bool(false))?,
            heap.alloc(ObjKind::Bool(true))?,
        ];
        let mut small_ints = Vec::with_capacity((SMALL_INT_MAX - SMALL_INT_MIN + 1) as usize);
        for v in SMALL_INT_MIN..=SMALL_INT_MAX {
            small_ints.push(heap.alloc(ObjKind::Int(v))?);
        }
        Ok(Self {
            inner: RefCell::new(Inner {
                heap,
                fault: None,
                modules: BTreeMap::new(),
                search_path: Vec::new(),
                none,
                bools,
                small_ints,
                down: false,
            }),
        })
    }

    // ========== Object creation (owned results) ==========

    /// Decode a host string into a runtime string.
    pub fn str_decode(&self, s: &str) -> RawObj {
        let mut inner = self.inner.borrow_mut();
        if s.contains('\0') {
            return inner.fail(Fault::new(
                FaultKind::Decode,
                "string contains an interior NUL",
            ));
        }
        inner.alloc_or_fault(ObjKind::Str(s.to_string()))
    }

    /// Allocate a runtime string.
    pub fn str_new(&self, s: &str) -> RawObj {
        self.inner
            .borrow_mut()
            .alloc_or_fault(ObjKind::Str(s.to_string()))
    }

    /// Allocate a runtime integer. Small values come from the cache, but the
    /// caller receives ownership of a new share either way.
    pub fn int_new(&self, v: i64) -> RawObj {
        let mut inner = self.inner.borrow_mut();
        match inner.int_obj(v) {
            Ok(r) => r,
            Err(fault) => inner.fail(fault),
        }
    }

    /// Allocate a runtime float.
    pub fn float_new(&self, v: f64) -> RawObj {
        self.inner.borrow_mut().alloc_or_fault(ObjKind::Float(v))
    }

    /// A new share of the `true` or `false` singleton.
    pub fn bool_new(&self, v: bool) -> RawObj {
        let mut inner = self.inner.borrow_mut();
        match inner.bool_obj(v) {
            Ok(r) => r,
            Err(fault) => inner.fail(fault),
        }
    }

    /// A new share of the `none` singleton.
    pub fn none_new(&self) -> RawObj {
        let mut inner = self.inner.borrow_mut();
        let none = inner.none;
        match inner.heap.incref(none) {
            Ok(_) => none,
            Err(fault) => inner.fail(fault),
        }
    }

    // ========== Modules ==========

    /// Import a module by name.
    ///
    /// `name_ref` must reference a runtime string; it is borrowed, not
    /// consumed. Resolution tries the registry first, then scans the search
    /// path for a `<name>.toml` manifest, which is loaded once and cached in
    /// the registry. The returned reference is owned by the caller.
    pub fn import(&self, name_ref: RawObj) -> RawObj {
        let mut inner = self.inner.borrow_mut();
        let name = match inner.heap.get(name_ref) {
            Ok(ObjKind::Str(s)) => s.clone(),
            Ok(other) => {
                let fault = Fault::new(
                    FaultKind::Type,
                    format!("import expects a string name, got {}", other.type_name()),
                );
                return inner.fail(fault);
            }
            Err(fault) => return inner.fail(fault),
        };
        match inner.import_by_name(&name) {
            Ok(r) => {
                debug!(module = %name, "module resolved");
                r
            }
            Err(fault) => inner.fail(fault),
        }
    }

    /// Get a module export by name. The returned reference is owned by the
    /// caller (the module keeps its own share).
    pub fn attr_get(&self, obj: RawObj, name: &str) -> RawObj {
        let mut inner = self.inner.borrow_mut();
        let export = match inner.heap.get(obj) {
            Ok(ObjKind::Module(def)) => match def.exports.get(name) {
                Some(r) => *r,
                None => {
                    let fault = Fault::new(
                        FaultKind::NoAttribute,
                        format!("module {} has no attribute {name:?}", def.name),
                    );
                    return inner.fail(fault);
                }
            },
            Ok(other) => {
                let fault = Fault::new(
                    FaultKind::Type,
                    format!("attribute lookup on a {}", other.type_name()),
                );
                return inner.fail(fault);
            }
            Err(fault) => return inner.fail(fault),
        };
        match inner.heap.incref(export) {
            Ok(_) => export,
            Err(fault) => inner.fail(fault),
        }
    }

    /// Whether the object can be called.
    pub fn is_callable(&self, obj: RawObj) -> bool {
        matches!(self.inner.borrow().heap.get(obj), Ok(ObjKind::Function(_)))
    }

    // ========== Tuples ==========

    /// Allocate a fixed-size tuple with all slots null.
    pub fn tuple_new(&self, len: usize) -> RawObj {
        self.inner
            .borrow_mut()
            .alloc_or_fault(ObjKind::Tuple(vec![RawObj::invalid(); len]))
    }

    /// Store `value` at `index`, taking over the caller's share of `value`
    /// **even when the call fails**: on the failure path the runtime
    /// releases the stolen share itself, so the caller must never hold a
    /// second owning reference to `value` across this call. Any previous
    /// occupant of the slot is released.
    pub fn tuple_set(&self, tuple: RawObj, index: usize, value: RawObj) -> bool {
        let mut inner = self.inner.borrow_mut();
        let result = inner.tuple_set_inner(tuple, index, value);
        match result {
            Ok(()) => true,
            Err(fault) => {
                // Steal-on-failure: the share passed in is released here.
                if value.is_valid() {
                    if let Err(release_fault) = inner.heap.decref(value) {
                        warn!(%release_fault, "stolen value was already stale");
                    }
                }
                inner.set_fault(fault);
                false
            }
        }
    }

    /// Read the value at `index` as a borrowed reference: no new share is
    /// created, the result must not be released, and it is only valid while
    /// the tuple keeps its own share.
    pub fn tuple_get(&self, tuple: RawObj, index: usize) -> RawObj {
        let mut inner = self.inner.borrow_mut();
        match inner.heap.get(tuple) {
            Ok(ObjKind::Tuple(items)) => match items.get(index) {
                Some(r) => *r,
                None => {
                    let len = items.len();
                    let fault = Fault::new(
                        FaultKind::Index,
                        format!("index {index} out of range for tuple of length {len}"),
                    );
                    inner.fail(fault)
                }
            },
            Ok(other) => {
                let fault = Fault::new(
                    FaultKind::Type,
                    format!("tuple access on a {}", other.type_name()),
                );
                inner.fail(fault)
            }
            Err(fault) => inner.fail(fault),
        }
    }

    // ========== Invocation ==========

    /// Call a function object with a tuple of arguments. Both are borrowed;
    /// the caller owns the returned result.
    pub fn call(&self, callable: RawObj, args: RawObj) -> RawObj {
        let mut inner = self.inner.borrow_mut();
        match inner.call_inner(callable, args) {
            Ok(r) => r,
            Err(fault) => inner.fail(fault),
        }
    }

    // ========== Reference-count bookkeeping ==========

    /// Add a share. Returns the new count, or `None` (as a logged no-op) if
    /// the reference is stale.
    pub fn incref(&self, r: RawObj) -> Option<u32> {
        let mut inner = self.inner.borrow_mut();
        match inner.heap.incref(r) {
            Ok(count) => {
                trace!(obj = %r, count, "incremented reference");
                Some(count)
            }
            Err(fault) => {
                warn!(obj = %r, %fault, "incref on a stale reference ignored");
                None
            }
        }
    }

    /// Release a share. Returns the remaining count, or `None` (as a logged
    /// no-op) if the reference is stale.
    pub fn decref(&self, r: RawObj) -> Option<u32> {
        let mut inner = self.inner.borrow_mut();
        match inner.heap.decref(r) {
            Ok(count) => {
                trace!(obj = %r, count, "decremented reference");
                Some(count)
            }
            Err(fault) => {
                warn!(obj = %r, %fault, "decref on a stale reference ignored");
                None
            }
        }
    }

    // ========== Introspection ==========

    /// Current reference count, if the reference is live.
    pub fn refcount(&self, r: RawObj) -> Option<u32> {
        self.inner.borrow().heap.refcount(r)
    }

    /// Number of live objects, runtime-owned ones included.
    pub fn live_objects(&self) -> usize {
        self.inner.borrow().heap.live()
    }

    /// Type name of a live object.
    pub fn type_name(&self, r: RawObj) -> Option<&'static str> {
        self.inner.borrow().heap.get(r).ok().map(ObjKind::type_name)
    }

    /// Drain the pending fault, leaving the slot empty.
    ///
    /// Faults are never surfaced automatically and a later fault overwrites
    /// an undrained one, so call this immediately after a fallible call
    /// reports failure.
    pub fn take_fault(&self) -> Option<Fault> {
        self.inner.borrow_mut().fault.take()
    }

    pub(crate) fn scalar_value(&self, r: RawObj) -> Option<Scalar> {
        match self.inner.borrow().heap.get(r).ok()? {
            ObjKind::None => Some(Scalar::Unit),
            ObjKind::Bool(v) => Some(Scalar::Bool(*v)),
            ObjKind::Int(v) => Some(Scalar::Int(*v)),
            ObjKind::Float(v) => Some(Scalar::Float(*v)),
            ObjKind::Str(v) => Some(Scalar::Str(v.clone())),
            ObjKind::Tuple(_) | ObjKind::Function(_) | ObjKind::Module(_) => None,
        }
    }

    // ========== Lifecycle (session-facing) ==========

    pub(crate) fn set_search_path(&self, paths: Vec<PathBuf>) {
        self.inner.borrow_mut().search_path = paths;
    }

    /// Register a module spec. Only the session calls this, and only before
    /// the session is handed to the embedder.
    pub(crate) fn register_module(&self, spec: &ModuleSpec) -> Result<(), Fault> {
        let mut inner = self.inner.borrow_mut();
        if inner.modules.contains_key(spec.name()) {
            return Err(Fault::new(
                FaultKind::ModuleLoad,
                format!("module {:?} is already registered", spec.name()),
            ));
        }
        let module = inner.instantiate_module(spec)?;
        inner.modules.insert(spec.name().to_string(), module);
        Ok(())
    }

    /// Release every runtime-owned share and audit the heap. Idempotent;
    /// returns one description per object that survived the audit (an
    /// embedder leak).
    pub(crate) fn shutdown(&self) -> Vec<String> {
        let mut inner = self.inner.borrow_mut();
        if inner.down {
            return Vec::new();
        }
        inner.down = true;

        let owned: Vec<RawObj> = inner
            .modules
            .values()
            .copied()
            .chain(inner.small_ints.iter().copied())
            .chain(inner.bools)
            .chain([inner.none])
            .collect();
        inner.modules.clear();
        for r in owned {
            if let Err(fault) = inner.heap.decref(r) {
                warn!(%fault, "runtime-owned share was already released");
            }
        }

        let leaks = inner.heap.live_report();
        if leaks.is_empty() {
            debug!("runtime shut down clean");
        } else {
            warn!(count = leaks.len(), "runtime shut down with leaked objects");
        }
        leaks
    }
}

impl Inner {
    fn set_fault(&mut self, fault: Fault) {
        debug!(%fault, "pending fault set");
        self.fault = Some(fault);
    }

    /// Record the fault and return the null reference.
    fn fail(&mut self, fault: Fault) -> RawObj {
        self.set_fault(fault);
        RawObj::invalid()
    }

    fn alloc_or_fault(&mut self, kind: ObjKind) -> RawObj {
        match self.heap.alloc(kind) {
            Ok(r) => r,
            Err(fault) => self.fail(fault),
        }
    }

    fn int_obj(&mut self, v: i64) -> Result<RawObj, Fault> {
        if (SMALL_INT_MIN..=SMALL_INT_MAX).contains(&v) {
            let r = self.small_ints[(v - SMALL_INT_MIN) as usize];
            self.heap.incref(r)?;
            Ok(r)
        } else {
            self.heap.alloc(ObjKind::Int(v))
        }
    }

    fn bool_obj(&mut self, v: bool) -> Result<RawObj, Fault> {
        let r = self.bools[v as usize];
        self.heap.incref(r)?;
        Ok(r)
    }

    /// Allocate an evaluation result, routing cached kinds through the
    /// singletons and the small-int cache.
    fn kind_obj(&mut self, kind: ObjKind) -> Result<RawObj, Fault> {
        match kind {
            ObjKind::None => {
                let none = self.none;
                self.heap.incref(none)?;
                Ok(none)
            }
            ObjKind::Bool(v) => self.bool_obj(v),
            ObjKind::Int(v) => self.int_obj(v),
            other => self.heap.alloc(other),
        }
    }

    fn scalar_obj(&mut self, value: &Scalar) -> Result<RawObj, Fault> {
        match value {
            Scalar::Unit => self.kind_obj(ObjKind::None),
            Scalar::Bool(v) => self.bool_obj(*v),
            Scalar::Int(v) => self.int_obj(*v),
            Scalar::Float(v) => self.heap.alloc(ObjKind::Float(*v)),
            Scalar::Str(v) => self.heap.alloc(ObjKind::Str(v.clone())),
        }
    }

    fn import_by_name(&mut self, name: &str) -> Result<RawObj, Fault> {
        if let Some(&module) = self.modules.get(name) {
            self.heap.incref(module)?;
            return Ok(module);
        }
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Fault::new(
                FaultKind::ModuleNotFound,
                format!("invalid module name {name:?}"),
            ));
        }
        let file_name = format!("{name}.toml");
        for dir in self.search_path.clone() {
            let path = dir.join(&file_name);
            if !path.is_file() {
                continue;
            }
            let spec = ModuleSpec::load(&path)
                .map_err(|err| Fault::new(FaultKind::ModuleLoad, err))?;
            let module = self.instantiate_module(&spec)?;
            // The registry keeps the share created above; the caller gets
            // its own.
            self.modules.insert(name.to_string(), module);
            self.heap.incref(module)?;
            return Ok(module);
        }
        let searched: Vec<String> = self
            .search_path
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        Err(Fault::new(
            FaultKind::ModuleNotFound,
            format!(
                "no module named {name:?} (searched: {})",
                if searched.is_empty() {
                    "registry only".to_string()
                } else {
                    searched.join(", ")
                }
            ),
        ))
    }

    /// Build a module object from a spec. The returned share belongs to the
    /// caller; the module itself owns one share of every export.
    fn instantiate_module(&mut self, spec: &ModuleSpec) -> Result<RawObj, Fault> {
        let mut exports = BTreeMap::new();
        if let Err(fault) = self.build_exports(spec, &mut exports) {
            // Roll back the half-built export set.
            for r in exports.values() {
                let _ = self.heap.decref(*r);
            }
            return Err(fault);
        }
        self.heap.alloc(ObjKind::Module(ModuleDef {
            name: spec.name.clone(),
            exports,
        }))
    }

    fn build_exports(
        &mut self,
        spec: &ModuleSpec,
        exports: &mut BTreeMap<String, RawObj>,
    ) -> Result<(), Fault> {
        for (export, builtin) in &spec.functions {
            let function = self.heap.alloc(ObjKind::Function(FunctionDef {
                name: format!("{}.{export}", spec.name),
                builtin: *builtin,
            }))?;
            exports.insert(export.clone(), function);
        }
        for (export, value) in &spec.constants {
            let constant = self.scalar_obj(value)?;
            exports.insert(export.clone(), constant);
        }
        Ok(())
    }

    fn tuple_set_inner(&mut self, tuple: RawObj, index: usize, value: RawObj) -> Result<(), Fault> {
        let items = match self.heap.get_mut(tuple)? {
            ObjKind::Tuple(items) => items,
            other => {
                let type_name = other.type_name();
                return Err(Fault::new(
                    FaultKind::Type,
                    format!("tuple store on a {type_name}"),
                ));
            }
        };
        let len = items.len();
        let Some(slot) = items.get_mut(index) else {
            return Err(Fault::new(
                FaultKind::Index,
                format!("index {index} out of range for tuple of length {len}"),
            ));
        };
        let previous = std::mem::replace(slot, value);
        if previous.is_valid() {
            if let Err(fault) = self.heap.decref(previous) {
                warn!(%fault, "replaced occupant was already stale");
            }
        }
        Ok(())
    }

    fn call_inner(&mut self, callable: RawObj, args: RawObj) -> Result<RawObj, Fault> {
        let def = match self.heap.get(callable)? {
            ObjKind::Function(def) => def.clone(),
            other => {
                return Err(Fault::new(
                    FaultKind::Type,
                    format!("cannot call a {}", other.type_name()),
                ))
            }
        };
        let items = match self.heap.get(args)? {
            ObjKind::Tuple(items) => items.clone(),
            other => {
                return Err(Fault::new(
                    FaultKind::Type,
                    format!("arguments must be a tuple, got a {}", other.type_name()),
                ))
            }
        };
        let arity = def.builtin.arity();
        if !arity.accepts(items.len()) {
            return Err(Fault::new(
                FaultKind::Arity,
                format!(
                    "{} takes {arity} argument(s), got {}",
                    def.name,
                    items.len()
                ),
            ));
        }
        let mut payloads = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if !item.is_valid() {
                return Err(Fault::new(
                    FaultKind::Type,
                    format!("argument {index} of {} is unset", def.name),
                ));
            }
            payloads.push(self.heap.get(*item)?.clone());
        }
        let result = def.builtin.eval(&def.name, &payloads)?;
        trace!(function = %def.name, "call evaluated");
        self.kind_obj(result)
    }
}
