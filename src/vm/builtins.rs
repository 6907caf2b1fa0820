//! The runtime's closed set of callable functions.
//!
//! Modules never execute code of their own: every exported function is bound
//! to one of these builtins. Host callables are deliberately not supported,
//! so this enum is the complete callable surface of the runtime.

use super::fault::{Fault, FaultKind};
use super::obj::ObjKind;

/// Identifier of a builtin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Sum of all arguments; zero arguments yields `0`.
    Add,
    /// Difference of exactly two arguments.
    Sub,
    /// Product of all arguments; zero arguments yields `1`.
    Mul,
    /// Negation of one argument.
    Neg,
    /// Absolute value of one argument.
    Abs,
    /// Smallest of one or more arguments.
    Min,
    /// Largest of one or more arguments.
    Max,
    /// Length of a string (in characters) or tuple.
    Len,
    /// Concatenation of zero or more strings.
    Concat,
    /// Structural equality of exactly two scalars.
    Eq,
}

/// Accepted argument count of a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub(crate) fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exact(want) => n == want,
            Arity::AtLeast(min) => n >= min,
            Arity::Any => true,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => f.write_str("any number of"),
        }
    }
}

impl Builtin {
    /// Stable identifier, as used in module manifests.
    pub fn id(&self) -> &'static str {
        match self {
            Builtin::Add => "add",
            Builtin::Sub => "sub",
            Builtin::Mul => "mul",
            Builtin::Neg => "neg",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Len => "len",
            Builtin::Concat => "concat",
            Builtin::Eq => "eq",
        }
    }

    /// Look up a builtin by its manifest identifier.
    pub fn from_id(id: &str) -> Option<Builtin> {
        match id {
            "add" => Some(Builtin::Add),
            "sub" => Some(Builtin::Sub),
            "mul" => Some(Builtin::Mul),
            "neg" => Some(Builtin::Neg),
            "abs" => Some(Builtin::Abs),
            "min" => Some(Builtin::Min),
            "max" => Some(Builtin::Max),
            "len" => Some(Builtin::Len),
            "concat" => Some(Builtin::Concat),
            "eq" => Some(Builtin::Eq),
            _ => None,
        }
    }

    pub(crate) fn arity(&self) -> Arity {
        match self {
            Builtin::Add | Builtin::Mul | Builtin::Concat => Arity::Any,
            Builtin::Sub | Builtin::Eq => Arity::Exact(2),
            Builtin::Neg | Builtin::Abs | Builtin::Len => Arity::Exact(1),
            Builtin::Min | Builtin::Max => Arity::AtLeast(1),
        }
    }

    /// Evaluate the builtin over cloned argument payloads.
    ///
    /// `name` is the qualified export name, used only in fault messages.
    /// Arity has already been checked by the caller.
    pub(crate) fn eval(&self, name: &str, args: &[ObjKind]) -> Result<ObjKind, Fault> {
        match self {
            Builtin::Add => fold_nums(name, args, Num::Int(0), |a, b| a.checked_add(b)),
            Builtin::Mul => fold_nums(name, args, Num::Int(1), |a, b| a.checked_mul(b)),
            Builtin::Sub => {
                let lhs = num_arg(name, &args[0])?;
                let rhs = num_arg(name, &args[1])?;
                lhs.checked_sub(rhs)
                    .map(Num::into_kind)
                    .ok_or_else(|| overflow(name))
            }
            Builtin::Neg => {
                let n = num_arg(name, &args[0])?;
                Num::Int(0)
                    .checked_sub(n)
                    .map(Num::into_kind)
                    .ok_or_else(|| overflow(name))
            }
            Builtin::Abs => match num_arg(name, &args[0])? {
                Num::Int(v) => v
                    .checked_abs()
                    .map(ObjKind::Int)
                    .ok_or_else(|| overflow(name)),
                Num::Float(v) => Ok(ObjKind::Float(v.abs())),
            },
            Builtin::Min => extreme(name, args, |a, b| a.lt(b)),
            Builtin::Max => extreme(name, args, |a, b| b.lt(a)),
            Builtin::Len => match &args[0] {
                ObjKind::Str(s) => Ok(ObjKind::Int(s.chars().count() as i64)),
                ObjKind::Tuple(items) => Ok(ObjKind::Int(items.len() as i64)),
                other => Err(type_fault(name, "a string or tuple", other)),
            },
            Builtin::Concat => {
                let mut out = String::new();
                for arg in args {
                    match arg {
                        ObjKind::Str(s) => out.push_str(s),
                        other => return Err(type_fault(name, "a string", other)),
                    }
                }
                Ok(ObjKind::Str(out))
            }
            Builtin::Eq => scalar_eq(name, &args[0], &args[1]).map(ObjKind::Bool),
        }
    }
}

/// Numeric argument, widened to float when any operand is a float.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn checked_add(self, other: Num) -> Option<Num> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a.checked_add(b).map(Num::Int),
            (a, b) => Some(Num::Float(a.as_f64() + b.as_f64())),
        }
    }

    fn checked_sub(self, other: Num) -> Option<Num> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a.checked_sub(b).map(Num::Int),
            (a, b) => Some(Num::Float(a.as_f64() - b.as_f64())),
        }
    }

    fn checked_mul(self, other: Num) -> Option<Num> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a.checked_mul(b).map(Num::Int),
            (a, b) => Some(Num::Float(a.as_f64() * b.as_f64())),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }

    /// Ordering that stays exact for int/int pairs; mixed pairs widen.
    /// Going through f64 unconditionally would conflate distinct integers
    /// beyond 2^53.
    fn lt(self, other: Num) -> bool {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a < b,
            (a, b) => a.as_f64() < b.as_f64(),
        }
    }

    fn eq_value(self, other: Num) -> bool {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    fn into_kind(self) -> ObjKind {
        match self {
            Num::Int(v) => ObjKind::Int(v),
            Num::Float(v) => ObjKind::Float(v),
        }
    }
}

fn num_arg(name: &str, kind: &ObjKind) -> Result<Num, Fault> {
    match kind {
        ObjKind::Int(v) => Ok(Num::Int(*v)),
        ObjKind::Float(v) => Ok(Num::Float(*v)),
        other => Err(type_fault(name, "a number", other)),
    }
}

fn fold_nums(
    name: &str,
    args: &[ObjKind],
    init: Num,
    op: impl Fn(Num, Num) -> Option<Num>,
) -> Result<ObjKind, Fault> {
    let mut acc = init;
    for arg in args {
        acc = op(acc, num_arg(name, arg)?).ok_or_else(|| overflow(name))?;
    }
    Ok(acc.into_kind())
}

fn extreme(
    name: &str,
    args: &[ObjKind],
    better: impl Fn(Num, Num) -> bool,
) -> Result<ObjKind, Fault> {
    let mut best = num_arg(name, &args[0])?;
    for arg in &args[1..] {
        let n = num_arg(name, arg)?;
        if better(n, best) {
            best = n;
        }
    }
    Ok(best.into_kind())
}

fn scalar_eq(name: &str, lhs: &ObjKind, rhs: &ObjKind) -> Result<bool, Fault> {
    for side in [lhs, rhs] {
        if matches!(side, ObjKind::Tuple(_) | ObjKind::Function(_) | ObjKind::Module(_)) {
            return Err(type_fault(name, "a scalar", side));
        }
    }
    Ok(match (lhs, rhs) {
        (ObjKind::None, ObjKind::None) => true,
        (ObjKind::Bool(a), ObjKind::Bool(b)) => a == b,
        (ObjKind::Str(a), ObjKind::Str(b)) => a == b,
        (ObjKind::Int(_) | ObjKind::Float(_), ObjKind::Int(_) | ObjKind::Float(_)) => {
            num_arg(name, lhs)?.eq_value(num_arg(name, rhs)?)
        }
        _ => false,
    })
}

fn type_fault(name: &str, want: &str, got: &ObjKind) -> Fault {
    Fault::new(
        FaultKind::Type,
        format!("{name} expects {want}, got {}", got.type_name()),
    )
}

fn overflow(name: &str) -> Fault {
    Fault::new(FaultKind::Arithmetic, format!("integer overflow in {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        for builtin in [
            Builtin::Add,
            Builtin::Sub,
            Builtin::Mul,
            Builtin::Neg,
            Builtin::Abs,
            Builtin::Min,
            Builtin::Max,
            Builtin::Len,
            Builtin::Concat,
            Builtin::Eq,
        ] {
            assert_eq!(Builtin::from_id(builtin.id()), Some(builtin));
        }
        assert_eq!(Builtin::from_id("frobnicate"), None);
    }

    #[test]
    fn test_add_widens_to_float() {
        let result = Builtin::Add
            .eval("demo.add", &[ObjKind::Int(1), ObjKind::Float(0.5)])
            .unwrap();
        match result {
            ObjKind::Float(v) => assert_eq!(v, 1.5),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn test_add_empty_is_zero() {
        let result = Builtin::Add.eval("demo.add", &[]).unwrap();
        match result {
            ObjKind::Int(0) => {}
            other => panic!("expected 0, got {other:?}"),
        }
    }

    #[test]
    fn test_add_overflow_is_arithmetic_fault() {
        let fault = Builtin::Add
            .eval("demo.add", &[ObjKind::Int(i64::MAX), ObjKind::Int(1)])
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::Arithmetic);
    }

    #[test]
    fn test_concat_rejects_numbers() {
        let fault = Builtin::Concat
            .eval("demo.concat", &[ObjKind::Str("a".into()), ObjKind::Int(1)])
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::Type);
    }

    #[test]
    fn test_arity_table() {
        assert!(Builtin::Add.arity().accepts(0));
        assert!(Builtin::Sub.arity().accepts(2));
        assert!(!Builtin::Sub.arity().accepts(1));
        assert!(Builtin::Min.arity().accepts(1));
        assert!(!Builtin::Min.arity().accepts(0));
    }

    #[test]
    fn test_eq_compares_across_numeric_kinds() {
        let result = Builtin::Eq
            .eval("demo.eq", &[ObjKind::Int(2), ObjKind::Float(2.0)])
            .unwrap();
        match result {
            ObjKind::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
    }

    #[test]
    fn test_eq_stays_exact_beyond_f64_precision() {
        // 2^53 + 1 and 2^53 collapse to the same f64; they are still
        // distinct integers.
        let a = (1i64 << 53) + 1;
        let b = 1i64 << 53;
        let result = Builtin::Eq
            .eval("demo.eq", &[ObjKind::Int(a), ObjKind::Int(b)])
            .unwrap();
        match result {
            ObjKind::Bool(false) => {}
            other => panic!("distinct ints must not compare equal, got {other:?}"),
        }

        let result = Builtin::Eq
            .eval("demo.eq", &[ObjKind::Int(a), ObjKind::Int(a)])
            .unwrap();
        match result {
            ObjKind::Bool(true) => {}
            other => panic!("expected true, got {other:?}"),
        }
    }

    #[test]
    fn test_min_max_stay_exact_beyond_f64_precision() {
        let lo = 1i64 << 53;
        let hi = lo + 1;
        let result = Builtin::Max
            .eval("demo.max", &[ObjKind::Int(lo), ObjKind::Int(hi)])
            .unwrap();
        match result {
            ObjKind::Int(v) => assert_eq!(v, hi),
            other => panic!("expected int, got {other:?}"),
        }
        let result = Builtin::Min
            .eval("demo.min", &[ObjKind::Int(hi), ObjKind::Int(lo)])
            .unwrap();
        match result {
            ObjKind::Int(v) => assert_eq!(v, lo),
            other => panic!("expected int, got {other:?}"),
        }
    }
}
