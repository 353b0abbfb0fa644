//! Branch condition evaluation.
//!
//! Comparison semantics are deliberately loose: slot values arrive as
//! arbitrary JSON and condition values as strings, so both sides go through a
//! coercion ladder (boolean, then numeric, then string) before comparing.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Comparison operator as authored in a scenario definition.
///
/// Unknown spellings deserialize into `Other` and always evaluate false.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, strum::Display, strum::EnumString)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = "contains")]
    Contains,
    #[strum(serialize = "!contains")]
    NotContains,
    #[strum(default)]
    Other(String),
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        Operator::from_str(&value).unwrap_or(Operator::Other(value))
    }
}

impl From<Operator> for String {
    fn from(value: Operator) -> Self {
        value.to_string()
    }
}

/// Evaluate `slot_value <operator> condition_value`.
///
/// - When `condition_value` is case-insensitively `"true"`/`"false"`, both
///   sides coerce to booleans and only `==`/`!=` are legal (others are false).
/// - `>`, `<`, `>=`, `<=` require both sides to coerce to numbers.
/// - `==`/`!=` compare string forms; a missing or null slot reads as `""`.
/// - `contains`/`!contains` do substring checks on the slot value's string
///   form; a missing or null slot contains nothing.
pub fn evaluate_condition(
    slot_value: Option<&Value>,
    operator: &Operator,
    condition_value: &str,
) -> bool {
    let cond_lower = condition_value.to_lowercase();
    if cond_lower == "true" || cond_lower == "false" {
        let bool_cond = cond_lower == "true";
        let bool_slot = string_form(slot_value).to_lowercase() == "true";
        return match operator {
            Operator::Eq => bool_slot == bool_cond,
            Operator::Ne => bool_slot != bool_cond,
            _ => false,
        };
    }

    let numbers = match (numeric_form(slot_value), parse_float_prefix(condition_value)) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    };

    match operator {
        Operator::Eq => string_form(slot_value) == condition_value,
        Operator::Ne => string_form(slot_value) != condition_value,
        Operator::Gt => numbers.is_some_and(|(a, b)| a > b),
        Operator::Lt => numbers.is_some_and(|(a, b)| a < b),
        Operator::Ge => numbers.is_some_and(|(a, b)| a >= b),
        Operator::Le => numbers.is_some_and(|(a, b)| a <= b),
        Operator::Contains => match slot_value {
            None | Some(Value::Null) => false,
            Some(v) => string_form(Some(v)).contains(condition_value),
        },
        Operator::NotContains => match slot_value {
            None | Some(Value::Null) => true,
            Some(v) => !string_form(Some(v)).contains(condition_value),
        },
        Operator::Other(op) => {
            warn!(operator = %op, "unsupported operator used in condition");
            false
        }
    }
}

/// String form of a slot value; missing and null read as `""`.
pub(crate) fn string_form(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(v) => v.to_string(),
    }
}

fn numeric_form(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_float_prefix(s),
        _ => None,
    }
}

/// `parseFloat`-style leading-prefix parse: `"12abc"` is 12, `"abc"` is none.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let trimmed = s.trim_start();
    let mut best = None;
    for end in 1..=trimmed.len() {
        if !trimmed.is_char_boundary(end) {
            continue;
        }
        if let Ok(v) = trimmed[..end].parse::<f64>()
            && !v.is_nan()
        {
            best = Some(v);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn op(s: &str) -> Operator {
        Operator::from(s.to_string())
    }

    #[test]
    fn test_boolean_coercion() {
        assert!(evaluate_condition(Some(&json!("true")), &op("=="), "true"));
        assert!(evaluate_condition(Some(&json!(true)), &op("=="), "True"));
        assert!(evaluate_condition(Some(&json!("yes")), &op("!="), "true"));
        assert!(evaluate_condition(None, &op("=="), "false"));
        // only ==/!= are legal against boolean condition values
        assert!(!evaluate_condition(Some(&json!("true")), &op(">"), "true"));
        assert!(!evaluate_condition(Some(&json!("true")), &op("contains"), "true"));
    }

    #[test]
    fn test_numeric_comparison() {
        assert!(evaluate_condition(Some(&json!("5")), &op(">"), "3"));
        assert!(evaluate_condition(Some(&json!(5)), &op(">="), "5"));
        assert!(evaluate_condition(Some(&json!("2.5")), &op("<"), "3"));
        assert!(evaluate_condition(Some(&json!("20")), &op(">="), "18"));
        assert!(!evaluate_condition(Some(&json!("10")), &op(">="), "18"));
        // non-numeric operands never satisfy an ordering operator
        assert!(!evaluate_condition(Some(&json!("a")), &op(">"), "b"));
        assert!(!evaluate_condition(None, &op("<"), "3"));
        assert!(!evaluate_condition(Some(&json!("")), &op(">"), "0"));
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("12abc"), Some(12.0));
        assert_eq!(parse_float_prefix(" -3.5kg"), Some(-3.5));
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(parse_float_prefix(""), None);
        assert!(evaluate_condition(Some(&json!("12px")), &op(">"), "10"));
    }

    #[test]
    fn test_string_equality() {
        assert!(evaluate_condition(Some(&json!("hello")), &op("=="), "hello"));
        assert!(evaluate_condition(Some(&json!(7)), &op("=="), "7"));
        assert!(evaluate_condition(None, &op("=="), ""));
        assert!(evaluate_condition(Some(&Value::Null), &op("=="), ""));
        assert!(evaluate_condition(Some(&json!("a")), &op("!="), "b"));
    }

    #[test]
    fn test_contains() {
        assert!(evaluate_condition(Some(&json!("abc")), &op("contains"), "b"));
        assert!(!evaluate_condition(Some(&json!("abc")), &op("contains"), "x"));
        assert!(evaluate_condition(None, &op("!contains"), "x"));
        assert!(evaluate_condition(Some(&Value::Null), &op("!contains"), "x"));
        assert!(!evaluate_condition(None, &op("contains"), "x"));
        assert!(evaluate_condition(Some(&json!(123)), &op("contains"), "2"));
    }

    #[test]
    fn test_unknown_operator_is_false() {
        assert!(!evaluate_condition(Some(&json!("a")), &op("~="), "a"));
    }

    #[test]
    fn test_operator_serde_round_trip() {
        let parsed: Operator = serde_json::from_str(r#"">=""#).unwrap();
        assert_eq!(parsed, Operator::Ge);
        assert_eq!(serde_json::to_string(&Operator::NotContains).unwrap(), r#""!contains""#);

        let unknown: Operator = serde_json::from_str(r#""weird""#).unwrap();
        assert_eq!(unknown, Operator::Other("weird".to_string()));
    }
}
