//! User-facing message lookup.
//!
//! Only the handful of messages the engine itself appends to a transcript
//! live here; full localization catalogs belong to the embedding UI.

use serde::{Deserialize, Serialize};

/// Language used for engine-generated transcript and validation messages.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Ko,
}

pub(crate) fn scenario_complete(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Scenario complete.",
        Locale::Ko => "시나리오가 완료되었습니다.",
    }
}

pub(crate) fn scenario_failed(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "An error occurred during the scenario.",
        Locale::Ko => "시나리오 진행 중 오류가 발생했습니다.",
    }
}

pub(crate) fn loop_limit_exceeded(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Scenario loop limit exceeded",
        Locale::Ko => "시나리오 반복 한도를 초과했습니다",
    }
}

pub(crate) fn required_field(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "This field is required.",
        Locale::Ko => "필수 입력 항목입니다.",
    }
}

pub(crate) fn invalid_date(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Please enter a date in YYYY-MM-DD format.",
        Locale::Ko => "날짜를 YYYY-MM-DD 형식으로 입력해주세요.",
    }
}

pub(crate) fn date_after_today(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Please choose a date after today.",
        Locale::Ko => "오늘 이후의 날짜를 선택해주세요.",
    }
}

pub(crate) fn date_before_today(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Please choose a date before today.",
        Locale::Ko => "오늘 이전의 날짜를 선택해주세요.",
    }
}

pub(crate) fn date_out_of_range(
    locale: Locale,
    start: &str,
    end: &str,
) -> String {
    match locale {
        Locale::En => format!("Please choose a date between {} and {}.", start, end),
        Locale::Ko => format!("{}부터 {} 사이의 날짜를 선택해주세요.", start, end),
    }
}
