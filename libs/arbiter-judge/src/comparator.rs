/// Result Comparator - structural equality between returned and expected values
///
/// **Rules:**
/// - Scalars: same type and same value. An expected `Int` only accepts an
///   equal `Int`; there is no int/float coercion.
/// - Floats: equal within `FLOAT_TOLERANCE`, absolute or relative. Two NaNs
///   are equal.
/// - Sequences: same length, element-wise equal, order-sensitive.
/// - Mappings: same key set, equal values; key order is irrelevant.
/// - A type mismatch is `false`, never a fault.
use arbiter_common::types::{Actual, Value};

pub const FLOAT_TOLERANCE: f64 = 1e-9;

pub fn deep_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => floats_equal(*a, *b),
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Seq(a), Value::Seq(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| deep_equal(v, other)))
        }
        _ => false,
    }
}

fn floats_equal(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    diff <= FLOAT_TOLERANCE || diff <= FLOAT_TOLERANCE * a.abs().max(b.abs())
}

/// Whether a case outcome passes: a fault never does
pub fn evaluate(actual: &Actual, expected: &Value) -> bool {
    match actual {
        Actual::Value(value) => deep_equal(value, expected),
        Actual::Fault(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_common::types::Fault;

    fn json(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert!(deep_equal(&Value::Int(3), &Value::Int(3)));
        assert!(!deep_equal(&Value::Int(3), &Value::Int(4)));
        assert!(deep_equal(&Value::Str("a".into()), &Value::Str("a".into())));
        assert!(!deep_equal(&Value::Str("A".into()), &Value::Str("a".into())));
        assert!(deep_equal(&Value::Null, &Value::Null));
        assert!(!deep_equal(&Value::Bool(true), &Value::Int(1)));
    }

    #[test]
    fn test_no_int_float_coercion() {
        assert!(!deep_equal(&Value::Float(1.0), &Value::Int(1)));
        assert!(!deep_equal(&Value::Int(1), &Value::Float(1.0)));
    }

    #[test]
    fn test_float_tolerance() {
        assert!(deep_equal(&Value::Float(0.1 + 0.2), &Value::Float(0.3)));
        assert!(deep_equal(&Value::Float(1e12 + 1e-4), &Value::Float(1e12)));
        assert!(!deep_equal(&Value::Float(2.5), &Value::Float(2.50001)));
    }

    #[test]
    fn test_nan_is_reflexive() {
        assert!(deep_equal(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
        assert!(!deep_equal(&Value::Float(f64::NAN), &Value::Float(0.0)));
    }

    #[test]
    fn test_sequences_are_ordered() {
        assert!(deep_equal(&json("[1, 2]"), &json("[1, 2]")));
        assert!(!deep_equal(&json("[1, 2]"), &json("[2, 1]")));
        assert!(!deep_equal(&json("[1, 2]"), &json("[1, 2, 3]")));
        assert!(deep_equal(&json("[[1], []]"), &json("[[1], []]")));
    }

    #[test]
    fn test_mappings_ignore_key_order() {
        assert!(deep_equal(&json(r#"{"a": 1, "b": 2}"#), &json(r#"{"b": 2, "a": 1}"#)));
        assert!(!deep_equal(&json(r#"{"a": 1}"#), &json(r#"{"a": 1, "b": 2}"#)));
        assert!(!deep_equal(&json(r#"{"a": 1}"#), &json(r#"{"b": 1}"#)));
    }

    #[test]
    fn test_reflexive_on_nested_values() {
        let v = json(r#"{"xs": [1, 2.5, "s", null, true], "m": {"k": [[]]}}"#);
        assert!(deep_equal(&v, &v));
    }

    #[test]
    fn test_fault_never_passes() {
        let fault = Actual::Fault(Fault::Runtime("boom".into()));
        assert!(!evaluate(&fault, &Value::Null));
        assert!(evaluate(&Actual::Value(Value::Int(1)), &Value::Int(1)));
    }
}
