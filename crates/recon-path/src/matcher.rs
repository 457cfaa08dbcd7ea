//! Desired-vs-observed value comparison

use serde_json::Value;

/// Check whether an observed value satisfies a desired one
///
/// Absent and `null` are interchangeable on both sides. Two numbers compare
/// by value (`1 == 1.0`); anything else needs exact structural equality.
#[must_use]
pub fn matches(desired: Option<&Value>, observed: Option<&Value>) -> bool {
    let desired = desired.filter(|v| !v.is_null());
    let observed = observed.filter(|v| !v.is_null());
    match (desired, observed) {
        (None, None) => true,
        (Some(d), Some(o)) => values_equal(d, o),
        _ => false,
    }
}

/// Numeric normalization for top-level numbers, structural equality otherwise
///
/// Numbers inside arrays and objects keep their JSON representation, so
/// `{"a": 1}` and `{"a": 1.0}` differ.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y || matches!((x.as_f64(), y.as_f64()), (Some(x), Some(y)) if x == y)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_and_null_are_equivalent() {
        assert!(matches(None, None));
        assert!(matches(Some(&Value::Null), None));
        assert!(matches(None, Some(&Value::Null)));
        assert!(matches(Some(&Value::Null), Some(&Value::Null)));
    }

    #[test]
    fn one_side_absent() {
        assert!(!matches(Some(&json!(1)), None));
        assert!(!matches(None, Some(&json!(false))));
        assert!(!matches(Some(&Value::Null), Some(&json!(0))));
    }

    #[test]
    fn numeric_normalization() {
        assert!(matches(Some(&json!(1)), Some(&json!(1.0))));
        assert!(matches(Some(&json!(69)), Some(&json!(69))));
        assert!(!matches(Some(&json!(1)), Some(&json!(1.5))));
        assert!(matches(Some(&json!(-3)), Some(&json!(-3.0))));
    }

    #[test]
    fn no_cross_type_coercion() {
        assert!(!matches(Some(&json!("1")), Some(&json!(1))));
        assert!(!matches(Some(&json!(true)), Some(&json!(1))));
        assert!(!matches(Some(&json!("true")), Some(&json!(true))));
    }

    #[test]
    fn nested_structures() {
        assert!(matches(
            Some(&json!({"a": [1, {"b": "x"}]})),
            Some(&json!({"a": [1, {"b": "x"}]}))
        ));
        assert!(!matches(
            Some(&json!({"a": [1, 2]})),
            Some(&json!({"a": [2, 1]}))
        ));
        assert!(!matches(
            Some(&json!({"a": 1})),
            Some(&json!({"a": 1, "b": 2}))
        ));
    }

    #[test]
    fn nested_numbers_keep_their_representation() {
        assert!(!matches(Some(&json!({"a": 1})), Some(&json!({"a": 1.0}))));
        assert!(!matches(Some(&json!([1, 2])), Some(&json!([1.0, 2]))));
        assert!(matches(Some(&json!({"a": 1.5})), Some(&json!({"a": 1.5}))));
    }
}
