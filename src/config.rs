use std::{fs, path::Path};

use serde::Deserialize;

use crate::locale::Locale;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// auto-advance iteration cap per input, guards against cyclic scenarios
    pub max_iterations: u32,
    /// pacing delay between auto-advanced nodes in milliseconds
    pub auto_advance_delay_ms: u64,
    /// language for engine-generated messages
    pub locale: Locale,
    /// http collaborator config
    pub http: HttpConfig,
    /// llm collaborator config
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// per-request timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// completion endpoint; llm nodes fail through onError when unset
    pub api_url: Option<String>,
    /// per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            auto_advance_delay_ms: 300,
            locale: Locale::default(),
            http: HttpConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_ms: 30_000,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Self {
        let data = fs::read_to_string(path.as_ref()).expect(&format!("failed to load config file {:?}", path.as_ref()));

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Self {
        let config = toml::from_str::<Config>(toml_str).expect("failed to parse the toml str");
        config
    }
}
