//! Input validation for slot-filling prompts and form elements.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::locale::{self, Locale};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A validation rule attached to a slot-filling node or a form element.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: ValidationKind,
    /// Date range constraint, only meaningful for `kind == Date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DateRangeRule>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationKind {
    #[default]
    Required,
    Date,
}

/// Date range constraint: the two named forms from the authoring tool, or an
/// explicit inclusive range.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum DateRangeRule {
    Named(String),
    #[serde(rename_all = "camelCase")]
    Custom {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

pub const RANGE_TODAY_AFTER: &str = "today after";
pub const RANGE_TODAY_BEFORE: &str = "today before";

/// Outcome of validating one input value.
#[derive(Debug, Clone, PartialEq)]
pub struct Validity {
    pub is_valid: bool,
    pub message: Option<String>,
}

impl Validity {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

/// Validate `value` against `rule`, producing a locale-specific message on
/// failure. `today` is injected so date rules are testable without a real
/// clock.
pub fn validate_input(
    value: &str,
    rule: &ValidationRule,
    locale: Locale,
    today: NaiveDate,
) -> Validity {
    let trimmed = value.trim();

    match rule.kind {
        ValidationKind::Required => {
            if trimmed.is_empty() {
                Validity::fail(locale::required_field(locale))
            } else {
                Validity::ok()
            }
        }
        ValidationKind::Date => {
            if trimmed.is_empty() {
                return Validity::fail(locale::required_field(locale));
            }
            let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) else {
                return Validity::fail(locale::invalid_date(locale));
            };
            match &rule.range {
                None => Validity::ok(),
                Some(DateRangeRule::Named(name)) if name == RANGE_TODAY_AFTER => {
                    if date > today {
                        Validity::ok()
                    } else {
                        Validity::fail(locale::date_after_today(locale))
                    }
                }
                Some(DateRangeRule::Named(name)) if name == RANGE_TODAY_BEFORE => {
                    if date < today {
                        Validity::ok()
                    } else {
                        Validity::fail(locale::date_before_today(locale))
                    }
                }
                Some(DateRangeRule::Named(_)) => Validity::ok(),
                Some(DateRangeRule::Custom {
                    start_date,
                    end_date,
                }) => {
                    if date >= *start_date && date <= *end_date {
                        Validity::ok()
                    } else {
                        Validity::fail(locale::date_out_of_range(
                            locale,
                            &start_date.format(DATE_FORMAT).to_string(),
                            &end_date.format(DATE_FORMAT).to_string(),
                        ))
                    }
                }
            }
        }
    }
}
