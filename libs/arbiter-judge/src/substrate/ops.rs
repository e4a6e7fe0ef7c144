//! Operator semantics shared by the interpreter and the builtins
//!
//! Integer arithmetic is checked: overflow is a runtime fault instead of a
//! silent wrap. Division and modulo follow the dialect (truncating for the
//! C family, flooring for Python).

use super::ast::{BinaryOp, UnaryOp};
use super::interpreter::{Budget, Trap};
use super::value::{compare, loose_eq, Dyn, DynMap, Key};
use super::Dialect;
use std::cmp::Ordering;

pub fn fault<T>(message: impl Into<String>) -> Result<T, Trap> {
    Err(Trap::Runtime(message.into()))
}

fn overflow<T>() -> Result<T, Trap> {
    fault("integer overflow")
}

pub fn unary(op: UnaryOp, value: &Dyn) -> Result<Dyn, Trap> {
    match op {
        UnaryOp::Not => Ok(Dyn::Bool(!value.is_truthy())),
        UnaryOp::Neg => match value {
            Dyn::Float(f) => Ok(Dyn::Float(-f)),
            other => match other.as_int() {
                Some(n) => n.checked_neg().map(Dyn::Int).map_or_else(overflow, Ok),
                None => fault(format!("bad operand type for unary -: {}", other.type_name())),
            },
        },
        UnaryOp::BitNot => match value.as_int() {
            Some(n) => Ok(Dyn::Int(!n)),
            None => fault(format!("bad operand type for unary ~: {}", value.type_name())),
        },
    }
}

pub fn binary(
    op: BinaryOp,
    a: &Dyn,
    b: &Dyn,
    dialect: Dialect,
    budget: &mut Budget,
) -> Result<Dyn, Trap> {
    match op {
        BinaryOp::Eq => return Ok(Dyn::Bool(loose_eq(a, b))),
        BinaryOp::Ne => return Ok(Dyn::Bool(!loose_eq(a, b))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(a, b).map_err(Trap::Runtime)?;
            return Ok(Dyn::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }));
        }
        _ => {}
    }

    // sequence and string forms first
    match (op, a, b) {
        (BinaryOp::Add, Dyn::Str(_) | Dyn::Char(_), Dyn::Str(_))
        | (BinaryOp::Add, Dyn::Str(_), Dyn::Char(_)) => {
            return concat(&a.render(), &b.render(), budget);
        }
        (BinaryOp::Add, Dyn::Str(s), other) | (BinaryOp::Add, other, Dyn::Str(s)) => {
            if !dialect.concat_coerces() {
                return fault(format!(
                    "can only concatenate str (not \"{}\") to str",
                    other.type_name()
                ));
            }
            return if matches!(a, Dyn::Str(_)) {
                concat(s, &other.render(), budget)
            } else {
                concat(&other.render(), s, budget)
            };
        }
        (BinaryOp::Add, Dyn::List(x), Dyn::List(y)) => {
            let mut joined = x.borrow().clone();
            joined.extend(y.borrow().iter().cloned());
            budget.check_len(joined.len())?;
            budget.charge(joined.len() as u64)?;
            return Ok(Dyn::list(joined));
        }
        (BinaryOp::Mul, Dyn::Str(s), n) | (BinaryOp::Mul, n, Dyn::Str(s))
            if n.as_int().is_some() =>
        {
            let times = n.as_int().unwrap_or(0).max(0) as usize;
            let len = s.chars().count().saturating_mul(times);
            budget.check_len(len)?;
            budget.charge(len as u64)?;
            return Ok(Dyn::str(&s.repeat(times)));
        }
        (BinaryOp::Mul, Dyn::List(l), n) | (BinaryOp::Mul, n, Dyn::List(l))
            if n.as_int().is_some() =>
        {
            let times = n.as_int().unwrap_or(0).max(0) as usize;
            let items = l.borrow().clone();
            let len = items.len().saturating_mul(times);
            budget.check_len(len)?;
            budget.charge(len as u64)?;
            let mut out = Vec::with_capacity(len);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            return Ok(Dyn::list(out));
        }
        (
            BinaryOp::Sub | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor,
            Dyn::Map(x),
            Dyn::Map(y),
        ) if x.borrow().is_set && y.borrow().is_set =>
        {
            return Ok(set_op(op, &x.borrow(), &y.borrow(), dialect));
        }
        _ => {}
    }

    if !a.is_number() || !b.is_number() {
        return fault(format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ));
    }

    let floats = matches!(a, Dyn::Float(_)) || matches!(b, Dyn::Float(_));
    if floats || (op == BinaryOp::Div && dialect.true_division()) {
        return float_op(op, a.as_float().unwrap_or(0.0), b.as_float().unwrap_or(0.0), dialect);
    }
    int_op(op, a.as_int().unwrap_or(0), b.as_int().unwrap_or(0), dialect)
}

fn concat(a: &str, b: &str, budget: &mut Budget) -> Result<Dyn, Trap> {
    let len = a.len() + b.len();
    budget.check_len(len)?;
    let mut out = String::with_capacity(len);
    out.push_str(a);
    out.push_str(b);
    Ok(Dyn::str(&out))
}

fn set_op(op: BinaryOp, x: &DynMap, y: &DynMap, dialect: Dialect) -> Dyn {
    let mut out = DynMap::new_set();
    let left = x.ordered(dialect);
    let right = y.ordered(dialect);
    match op {
        BinaryOp::BitOr => {
            for (k, _) in left.into_iter().chain(right) {
                out.insert(k, Dyn::Null);
            }
        }
        BinaryOp::BitAnd => {
            for (k, _) in left.into_iter().filter(|(k, _)| y.contains(k)) {
                out.insert(k, Dyn::Null);
            }
        }
        BinaryOp::Sub => {
            for (k, _) in left.into_iter().filter(|(k, _)| !y.contains(k)) {
                out.insert(k, Dyn::Null);
            }
        }
        _ => {
            for (k, _) in left.into_iter().filter(|(k, _)| !y.contains(k)) {
                out.insert(k, Dyn::Null);
            }
            for (k, _) in right.into_iter().filter(|(k, _)| !x.contains(k)) {
                out.insert(k, Dyn::Null);
            }
        }
    }
    Dyn::map(out)
}

fn int_op(op: BinaryOp, a: i64, b: i64, dialect: Dialect) -> Result<Dyn, Trap> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return fault("division by zero");
            }
            a.checked_div(b)
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return fault("integer division by zero");
            }
            floor_div(a, b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return fault("modulo by zero");
            }
            if dialect.floor_modulo() {
                floor_mod(a, b)
            } else {
                a.checked_rem(b)
            }
        }
        BinaryOp::Pow => {
            if b < 0 {
                return Ok(Dyn::Float((a as f64).powf(b as f64)));
            }
            u32::try_from(b).ok().and_then(|e| a.checked_pow(e))
        }
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        BinaryOp::Shl => {
            if !(0..64).contains(&b) {
                return fault(format!("shift count {} out of range", b));
            }
            a.checked_mul(1i64 << b)
        }
        BinaryOp::Shr => {
            if b < 0 {
                return fault("negative shift count");
            }
            Some(a >> b.min(63))
        }
        _ => None,
    };
    result.map(Dyn::Int).map_or_else(overflow, Ok)
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64, dialect: Dialect) -> Result<Dyn, Trap> {
    let strict_zero = dialect.true_division();
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 && strict_zero {
                return fault("float division by zero");
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return fault("float floor division by zero");
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 && strict_zero {
                return fault("float modulo by zero");
            }
            let r = a % b;
            if dialect.floor_modulo() && r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => a.powf(b),
        other => {
            return fault(format!("unsupported operand type for {}: float", other.symbol()));
        }
    };
    Ok(Dyn::Float(value))
}

/// Resolve a possibly negative index against `len`
pub fn resolve_index(index: &Dyn, len: usize, dialect: Dialect) -> Result<usize, Trap> {
    let Some(i) = index.as_int() else {
        return fault(format!("indices must be integers, not {}", index.type_name()));
    };
    let resolved = if i < 0 && dialect.negative_index() {
        i + len as i64
    } else {
        i
    };
    if resolved < 0 || resolved >= len as i64 {
        return fault(format!("index {} out of range for length {}", i, len));
    }
    Ok(resolved as usize)
}

/// `container[key]` for reads. Maps with a default materialise missing keys.
pub fn index_get(container: &Dyn, key: &Dyn, dialect: Dialect) -> Result<Dyn, Trap> {
    match container {
        Dyn::List(l) => {
            let l = l.borrow();
            let i = resolve_index(key, l.len(), dialect)?;
            Ok(l[i].clone())
        }
        Dyn::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = resolve_index(key, chars.len(), dialect)?;
            Ok(dialect.char_value(chars[i]))
        }
        Dyn::Map(m) => {
            let k = Key::from_dyn(key).map_err(Trap::Runtime)?;
            if let Some(v) = m.borrow().get(&k) {
                return Ok(v.clone());
            }
            let default = m.borrow().default.clone();
            match default {
                Some(template) => {
                    let fresh = template.deep_clone();
                    m.borrow_mut().insert(k, fresh.clone());
                    Ok(fresh)
                }
                None => fault(format!("key {} not found", key.render())),
            }
        }
        other => fault(format!("'{}' value is not subscriptable", other.type_name())),
    }
}

/// Element sequence of an iterable (list items, string characters, map keys)
pub fn elements(value: &Dyn, dialect: Dialect) -> Result<Vec<Dyn>, Trap> {
    match value {
        Dyn::List(l) => Ok(l.borrow().clone()),
        Dyn::Str(s) => Ok(s.chars().map(|c| dialect.char_value(c)).collect()),
        Dyn::Map(m) => Ok(m
            .borrow()
            .ordered(dialect)
            .into_iter()
            .map(|(k, _)| k.to_dyn())
            .collect()),
        other => fault(format!("'{}' value is not iterable", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn budget() -> Budget {
        Budget::new(
            Instant::now() + Duration::from_secs(5),
            Arc::new(AtomicBool::new(false)),
            1000,
        )
    }

    fn run(op: BinaryOp, a: Dyn, b: Dyn, dialect: Dialect) -> Result<Dyn, Trap> {
        binary(op, &a, &b, dialect, &mut budget())
    }

    #[test]
    fn test_division_by_dialect() {
        let (c, py) = (Dialect::CFamily, Dialect::Python);
        assert!(matches!(run(BinaryOp::Div, Dyn::Int(7), Dyn::Int(2), c), Ok(Dyn::Int(3))));
        assert!(matches!(run(BinaryOp::Div, Dyn::Int(-7), Dyn::Int(2), c), Ok(Dyn::Int(-3))));
        assert!(matches!(
            run(BinaryOp::Div, Dyn::Int(7), Dyn::Int(2), py),
            Ok(Dyn::Float(f)) if f == 3.5
        ));
        assert!(matches!(
            run(BinaryOp::FloorDiv, Dyn::Int(-7), Dyn::Int(2), py),
            Ok(Dyn::Int(-4))
        ));
    }

    #[test]
    fn test_modulo_by_dialect() {
        let c_mod = run(BinaryOp::Mod, Dyn::Int(-7), Dyn::Int(3), Dialect::CFamily);
        assert!(matches!(c_mod, Ok(Dyn::Int(-1))));
        let py_mod = run(BinaryOp::Mod, Dyn::Int(-7), Dyn::Int(3), Dialect::Python);
        assert!(matches!(py_mod, Ok(Dyn::Int(2))));
    }

    #[test]
    fn test_zero_division_and_overflow_fault() {
        assert!(run(BinaryOp::Div, Dyn::Int(1), Dyn::Int(0), Dialect::CFamily).is_err());
        assert!(run(BinaryOp::Mod, Dyn::Int(1), Dyn::Int(0), Dialect::Python).is_err());
        assert_eq!(
            run(BinaryOp::Mul, Dyn::Int(i64::MAX), Dyn::Int(2), Dialect::CFamily).unwrap_err(),
            Trap::Runtime("integer overflow".into())
        );
    }

    #[test]
    fn test_char_arithmetic() {
        let distance = run(BinaryOp::Sub, Dyn::Char('c'), Dyn::Char('a'), Dialect::CFamily);
        assert!(matches!(distance, Ok(Dyn::Int(2))));
        let joined = run(BinaryOp::Add, Dyn::str("ab"), Dyn::Char('c'), Dialect::CFamily).unwrap();
        assert_eq!(joined.render(), "abc");
    }

    #[test]
    fn test_concat_coercion_by_dialect() {
        assert_eq!(
            run(BinaryOp::Add, Dyn::str("n="), Dyn::Int(3), Dialect::CFamily).unwrap().render(),
            "n=3"
        );
        assert!(run(BinaryOp::Add, Dyn::str("n="), Dyn::Int(3), Dialect::Python).is_err());
    }

    #[test]
    fn test_sequence_repetition() {
        let zero = Dyn::list(vec![Dyn::Int(0)]);
        let row = run(BinaryOp::Mul, zero, Dyn::Int(3), Dialect::Python).unwrap();
        assert_eq!(row.render(), "[0, 0, 0]");
        assert!(run(BinaryOp::Mul, Dyn::str("ab"), Dyn::Int(5000), Dialect::Python).is_err());
    }

    #[test]
    fn test_negative_index_by_dialect() {
        let list = Dyn::list(vec![Dyn::Int(1), Dyn::Int(2)]);
        assert!(matches!(index_get(&list, &Dyn::Int(-1), Dialect::Python), Ok(Dyn::Int(2))));
        assert!(index_get(&list, &Dyn::Int(-1), Dialect::CFamily).is_err());
        assert!(index_get(&list, &Dyn::Int(2), Dialect::Python).is_err());
    }

    #[test]
    fn test_map_default_materialises() {
        let mut map = DynMap::new();
        map.default = Some(Dyn::list(vec![]));
        let map = Dyn::map(map);
        let first = index_get(&map, &Dyn::Int(1), Dialect::CFamily).unwrap();
        if let Dyn::List(l) = &first {
            l.borrow_mut().push(Dyn::Int(5));
        }
        assert_eq!(index_get(&map, &Dyn::Int(1), Dialect::CFamily).unwrap().render(), "[5]");
        assert!(index_get(&Dyn::map(DynMap::new()), &Dyn::Int(1), Dialect::Python).is_err());
    }
}
