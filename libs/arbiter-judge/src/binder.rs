//! Parameter Binder - maps a test case's named inputs onto declared parameters

use arbiter_common::types::{Fault, Value};
use std::collections::BTreeMap;

/// Build the positional argument list in declaration order.
///
/// Lookup is by name only. A declared parameter missing from the input is an
/// arity mismatch; input fields nobody declared are ignored.
pub fn bind(params: &[String], input: &BTreeMap<String, Value>) -> Result<Vec<Value>, Fault> {
    params
        .iter()
        .map(|name| {
            input.get(name).cloned().ok_or_else(|| {
                Fault::Arity(format!("no input named '{}' for declared parameter", name))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_binds_in_declaration_order() {
        let params = vec!["target".to_string(), "nums".to_string()];
        let args = bind(
            &params,
            &input(&[("nums", Value::Seq(vec![Value::Int(1)])), ("target", Value::Int(9))]),
        )
        .unwrap();
        assert_eq!(args, vec![Value::Int(9), Value::Seq(vec![Value::Int(1)])]);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let params = vec!["n".to_string()];
        let args = bind(&params, &input(&[("n", Value::Int(3)), ("unused", Value::Null)])).unwrap();
        assert_eq!(args, vec![Value::Int(3)]);
    }

    #[test]
    fn test_missing_field_is_arity_fault() {
        let params = vec!["nums".to_string(), "k".to_string()];
        let result = bind(&params, &input(&[("nums", Value::Seq(vec![]))]));
        assert!(matches!(result, Err(Fault::Arity(msg)) if msg.contains("'k'")));
    }

    #[test]
    fn test_no_params() {
        assert_eq!(bind(&[], &BTreeMap::new()).unwrap(), Vec::<Value>::new());
    }
}
