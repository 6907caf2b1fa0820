//! The runtime's pending-error value.

use std::fmt;

use thiserror::Error;

/// Category of a runtime fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A host string could not be decoded into a runtime string.
    Decode,
    /// The object heap is exhausted.
    Memory,
    /// A reference to an object whose last share was already released.
    Expired,
    /// An operation was applied to an object of the wrong type.
    Type,
    /// A callable was invoked with the wrong number of arguments.
    Arity,
    /// A container index is out of range.
    Index,
    /// Integer overflow or a similar numeric failure.
    Arithmetic,
    /// No module with the requested name on the search path or in the registry.
    ModuleNotFound,
    /// A module was found but its manifest could not be loaded.
    ModuleLoad,
    /// The module has no export with the requested name.
    NoAttribute,
}

impl FaultKind {
    /// Stable identifier used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Decode => "decode",
            FaultKind::Memory => "memory",
            FaultKind::Expired => "expired",
            FaultKind::Type => "type",
            FaultKind::Arity => "arity",
            FaultKind::Index => "index",
            FaultKind::Arithmetic => "arithmetic",
            FaultKind::ModuleNotFound => "module-not-found",
            FaultKind::ModuleLoad => "module-load",
            FaultKind::NoAttribute => "no-attribute",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault recorded in the runtime's pending-error slot.
///
/// Fallible runtime calls signal failure by returning a null reference (or a
/// failure status) and storing one of these. The slot holds at most one
/// fault; a later fault overwrites an undrained one, so callers must poll
/// with [`Vm::take_fault`](super::Vm::take_fault) immediately after any
/// fallible call.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    /// What went wrong.
    pub kind: FaultKind,
    /// Human-readable detail.
    pub message: String,
}

impl Fault {
    pub(crate) fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
