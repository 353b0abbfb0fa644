//! Slot template interpolation.
//!
//! Message content, prompts, URLs, headers and request bodies may embed
//! `{path}` placeholders that are filled from the session's slots. A
//! placeholder whose path does not resolve is left as the literal placeholder
//! text, so authoring mistakes stay visible instead of disappearing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{common::Slots, eval::path::resolve_path};

/// Placeholder pattern: `{path}` where path is a dot/bracket slot path.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_$][A-Za-z0-9_$.\[\]]*)\}").unwrap());

/// Replace every `{path}` placeholder in `template` with the resolved slot
/// value's string form. Unresolved placeholders stay literal.
pub fn interpolate(
    template: &str,
    slots: &Slots,
) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| match resolve_path(slots, &caps[1]) {
            Some(value) => value_to_string(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// String form used when a value is spliced into display text or a request
/// field. Arrays and objects render as their JSON form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        v => v.to_string(),
    }
}

/// Resolve `{path}` placeholders in every string leaf of a JSON value.
///
/// A string that consists of exactly one placeholder takes the slot value
/// itself (preserving its JSON type); mixed text falls back to string
/// interpolation. Used for API request bodies.
pub fn resolve_json_value(
    value: &Value,
    slots: &Slots,
) -> Value {
    match value {
        Value::String(s) => {
            if let Some(caps) = PLACEHOLDER.captures(s)
                && caps[0].len() == s.len()
                && let Some(resolved) = resolve_path(slots, &caps[1])
            {
                return resolved.clone();
            }
            Value::String(interpolate(s, slots))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_json_value(v, slots)).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), resolve_json_value(v, slots))).collect()),
        _ => value.clone(),
    }
}
