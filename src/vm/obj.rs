//! Opaque object references and object payloads.

use std::collections::BTreeMap;
use std::fmt;

use super::builtins::Builtin;

/// Opaque reference to a runtime object.
///
/// A `RawObj` packs a heap slot index and a generation counter. It is `Copy`
/// and carries no ownership by itself: holding one does not keep the object
/// alive, and using one after the object's last share was released is
/// detected by the runtime (the generation no longer matches) instead of
/// touching freed state.
///
/// The zero value is the null reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawObj {
    bits: u64,
}

impl RawObj {
    /// Create a null reference.
    #[inline]
    pub const fn invalid() -> Self {
        Self { bits: 0 }
    }

    /// Check if this reference is non-null.
    ///
    /// A non-null reference may still be expired; only the runtime can tell.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.bits != 0
    }

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        debug_assert!(generation != 0, "generation zero is reserved for null");
        Self {
            bits: (generation as u64) << 32 | index as u64,
        }
    }

    pub(crate) fn index(&self) -> u32 {
        (self.bits & 0xffff_ffff) as u32
    }

    pub(crate) fn generation(&self) -> u32 {
        (self.bits >> 32) as u32
    }
}

impl Default for RawObj {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Display for RawObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}.{}", self.index(), self.generation())
        } else {
            f.write_str("#null")
        }
    }
}

/// Payload of a live runtime object.
#[derive(Debug, Clone)]
pub(crate) enum ObjKind {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Fixed-size ordered container. Slots start null.
    Tuple(Vec<RawObj>),
    Function(FunctionDef),
    Module(ModuleDef),
}

/// A callable bound to one of the runtime's builtins.
#[derive(Debug, Clone)]
pub(crate) struct FunctionDef {
    /// Qualified name (`module.export`) used in diagnostics.
    pub name: String,
    pub builtin: Builtin,
}

/// A loaded module: a name plus its exported objects.
#[derive(Debug, Clone)]
pub(crate) struct ModuleDef {
    pub name: String,
    /// The module owns one share of every export.
    pub exports: BTreeMap<String, RawObj>,
}

impl ObjKind {
    /// Short type name used in diagnostics.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            ObjKind::None => "none",
            ObjKind::Bool(_) => "bool",
            ObjKind::Int(_) => "int",
            ObjKind::Float(_) => "float",
            ObjKind::Str(_) => "str",
            ObjKind::Tuple(_) => "tuple",
            ObjKind::Function(_) => "function",
            ObjKind::Module(_) => "module",
        }
    }

    /// References this object owns, for cascading release.
    pub(crate) fn children(&self) -> Vec<RawObj> {
        match self {
            ObjKind::Tuple(items) => items.iter().copied().filter(RawObj::is_valid).collect(),
            ObjKind::Module(def) => def.exports.values().copied().collect(),
            _ => Vec::new(),
        }
    }
}
