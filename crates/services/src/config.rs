use std::env;
use std::time::Duration;

use assess_core::grading::{ComparisonPolicy, TextMatch};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime settings for the engine and its remote collaborators.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub api_base_url: Option<Url>,
    pub api_token: Option<String>,
    pub submit_timeout: Duration,
    pub text_match: TextMatch,
    pub database_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            text_match: TextMatch::default(),
            database_url: None,
        }
    }
}

impl EngineConfig {
    /// Read `ASSESS_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("ASSESS_API_BASE_URL") {
            let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
                key: "ASSESS_API_BASE_URL",
                source,
            })?;
            config.api_base_url = Some(url);
        }
        config.api_token = get("ASSESS_API_TOKEN");
        if let Some(raw) = get("ASSESS_SUBMIT_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "ASSESS_SUBMIT_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config.submit_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get("ASSESS_TEXT_MATCH") {
            config.text_match = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "ASSESS_TEXT_MATCH",
                value: raw.clone(),
            })?;
        }
        config.database_url = get("ASSESS_DB_URL");
        Ok(config)
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: Url) -> Self {
        self.api_base_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_text_match(mut self, text_match: TextMatch) -> Self {
        self.text_match = text_match;
        self
    }

    #[must_use]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn offline(&self) -> bool {
        self.api_base_url.is_none()
    }

    #[must_use]
    pub fn comparison_policy(&self) -> ComparisonPolicy {
        ComparisonPolicy::uniform(self.text_match)
    }
}
