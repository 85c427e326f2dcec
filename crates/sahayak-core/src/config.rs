//! Runtime settings

use serde::{Deserialize, Serialize};

/// Tunable knobs for the answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Chunks fetched per retrieval (default 5)
    pub top_k: usize,
    /// Maximum query reformulation retries (default 3)
    pub max_retries: u32,
    /// Recent conversation turns fed into generation (default 10)
    pub history_window: usize,
    /// Whether provider fallback is enabled (default true)
    pub enable_fallback: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_retries: 3,
            history_window: 10,
            enable_fallback: true,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults
    /// for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            top_k: env_parse("SAHAYAK_TOP_K", defaults.top_k),
            max_retries: env_parse("SAHAYAK_MAX_RETRIES", defaults.max_retries),
            history_window: env_parse("SAHAYAK_HISTORY_WINDOW", defaults.history_window),
            enable_fallback: env_parse("SAHAYAK_ENABLE_FALLBACK", defaults.enable_fallback),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.history_window, 10);
        assert!(settings.enable_fallback);
    }
}
