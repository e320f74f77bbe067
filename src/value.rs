//! Runtime values.
//!
//! Scalars copy; arrays, records, strings, and access values share their
//! backing store through `Rc<RefCell<..>>` reference semantics. Booleans,
//! characters, and enumeration values are integers carrying their ordinal
//! position. Strings index from 1.

use std::cell::RefCell;
use std::rc::Rc;

use crate::intern::Symbol;
use crate::types::TypeId;

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Int { ty: TypeId, val: i64 },
    Real { ty: TypeId, val: f64 },
    Str(Rc<RefCell<Vec<u8>>>),
    Array(Rc<RefCell<ArrayVal>>),
    Record(Rc<RefCell<RecordVal>>),
    Access {
        ty: TypeId,
        cell: Option<Rc<RefCell<Value>>>,
    },
    Task(TypeId),
    ExceptionOccurrence(Symbol),
}

#[derive(Debug)]
pub struct ArrayVal {
    pub ty: TypeId,
    pub low: i64,
    pub high: i64,
    pub elems: Vec<Value>,
}

#[derive(Debug)]
pub struct RecordVal {
    pub ty: TypeId,
    pub fields: Vec<(Symbol, Value)>,
}

impl Value {
    pub fn int(ty: TypeId, val: i64) -> Value {
        Value::Int { ty, val }
    }

    pub fn boolean(ty: TypeId, b: bool) -> Value {
        Value::Int { ty, val: b as i64 }
    }

    pub fn string(bytes: Vec<u8>) -> Value {
        Value::Str(Rc::new(RefCell::new(bytes)))
    }

    pub fn from_str(s: &str) -> Value {
        Value::string(s.as_bytes().to_vec())
    }

    /// Truth of a boolean-typed integer.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Int { val, .. } if *val != 0)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int { val, .. } => Some(*val),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real { val, .. } => Some(*val),
            Value::Int { val, .. } => Some(*val as f64),
            _ => None,
        }
    }
}

/// Mathematical modulo: the result takes the divisor's sign.
pub fn int_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

/// Remainder truncating toward zero, the `rem` operator.
pub fn int_rem(a: i64, b: i64) -> i64 {
    a % b
}

/// Integer exponentiation; negative exponents have no integer result.
pub fn int_pow(base: i64, exp: i64) -> Option<i64> {
    if exp < 0 {
        return None;
    }
    let exp = u32::try_from(exp).ok()?;
    base.checked_pow(exp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_algebra_holds() {
        for a in [-17i64, -5, -1, 0, 1, 5, 17, 100] {
            for b in [-7i64, -3, -1, 1, 3, 7] {
                assert_eq!(a, (a / b) * b + int_rem(a, b), "a={} b={}", a, b);
            }
        }
    }

    #[test]
    fn mod_takes_divisor_sign() {
        assert_eq!(int_mod(7, 3), 1);
        assert_eq!(int_mod(-7, 3), 2);
        assert_eq!(int_mod(7, -3), -2);
        assert_eq!(int_mod(-7, -3), -1);
        for a in -20i64..=20 {
            for b in [3i64, 8] {
                let m = int_mod(a, b);
                assert!((0..b).contains(&m), "a={} b={} m={}", a, b, m);
            }
        }
    }

    #[test]
    fn rem_truncates_toward_zero() {
        assert_eq!(int_rem(7, 3), 1);
        assert_eq!(int_rem(-7, 3), -1);
        assert_eq!(int_rem(7, -3), 1);
        assert_eq!(int_rem(-7, -3), -1);
    }

    #[test]
    fn pow_rejects_negative_exponents() {
        assert_eq!(int_pow(2, 10), Some(1024));
        assert_eq!(int_pow(3, 0), Some(1));
        assert_eq!(int_pow(2, -1), None);
        assert_eq!(int_pow(i64::MAX, 2), None);
    }

    #[test]
    fn aggregates_share_backing() {
        let mut interner = crate::intern::Interner::new();
        let mut types = crate::types::TypeTable::new();
        let predef = types.install_predefined(&mut interner);
        let arr = Value::Array(Rc::new(RefCell::new(ArrayVal {
            ty: predef.string,
            low: 1,
            high: 1,
            elems: vec![Value::None],
        })));
        let alias = arr.clone();
        if let (Value::Array(a), Value::Array(b)) = (&arr, &alias) {
            assert!(Rc::ptr_eq(a, b));
        } else {
            unreachable!();
        }
    }
}
