//! Host-side scalar values and their marshaling.

use std::fmt;

use crate::vm::{RawObj, Vm};

/// A host value that can cross into and out of the runtime.
///
/// The set is deliberately closed: the invocation pipeline marshals these
/// five shapes and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// The runtime's `none` value.
    Unit,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// String.
    Str(String),
}

impl Scalar {
    /// Marshal into a runtime object. The returned reference is owned by
    /// the caller; null means the runtime recorded a pending fault.
    pub fn to_object(&self, vm: &Vm) -> RawObj {
        match self {
            Scalar::Unit => vm.none_new(),
            Scalar::Bool(v) => vm.bool_new(*v),
            Scalar::Int(v) => vm.int_new(*v),
            Scalar::Float(v) => vm.float_new(*v),
            Scalar::Str(v) => vm.str_new(v),
        }
    }

    /// Marshal a runtime object back into a host value. Returns `None` for
    /// stale references and for non-scalar objects (tuples, functions,
    /// modules).
    pub fn from_object(vm: &Vm, r: RawObj) -> Option<Scalar> {
        vm.scalar_value(r)
    }

    /// Parse a command-line argument: integer, then float, then boolean,
    /// falling back to a plain string.
    pub fn parse(text: &str) -> Scalar {
        if let Ok(v) = text.parse::<i64>() {
            return Scalar::Int(v);
        }
        if let Ok(v) = text.parse::<f64>() {
            return Scalar::Float(v);
        }
        match text {
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            _ => Scalar::Str(text.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Unit => f.write_str("none"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Str(v) => f.write_str(v),
        }
    }
}

impl From<()> for Scalar {
    fn from(_: ()) -> Scalar {
        Scalar::Unit
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Scalar {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Scalar {
        Scalar::Int(v as i64)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Scalar {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Scalar {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Scalar {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Scalar {
        Scalar::Str(v)
    }
}
