use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub page_size: u32,
    pub comments_page_size: u32,
    pub scroll_debounce: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid integer for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
    #[error("dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let api_base_url = env.read_string("MURMUR_API_BASE_URL", "http://127.0.0.1:8080/api");
        if api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "MURMUR_API_BASE_URL",
                api_base_url,
            ));
        }
        let api_token = env.read_optional_string("MURMUR_API_TOKEN");
        let request_timeout_secs = env.read_u64("MURMUR_REQUEST_TIMEOUT_SECS", 15)?;
        let page_size = env.read_page_size("MURMUR_PAGE_SIZE", 10)?;
        let comments_page_size = env.read_page_size("MURMUR_COMMENTS_PAGE_SIZE", 20)?;
        let scroll_debounce_ms = env.read_u64("MURMUR_SCROLL_DEBOUNCE_MS", 500)?;

        Ok(Self {
            api_base_url: api_base_url.trim().to_string(),
            api_token,
            request_timeout: Duration::from_secs(request_timeout_secs),
            page_size,
            comments_page_size,
            scroll_debounce: Duration::from_millis(scroll_debounce_ms),
        })
    }
}

/// Loads `.env` from the working directory when present. Variables already
/// set in the environment are kept.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn read_string(&self, key: &'static str, default: &'static str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn read_u64(&self, key: &'static str, default: u64) -> Result<u64, ConfigError> {
        let raw = (self.0)(key).unwrap_or_else(|| default.to_string());
        raw.trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(key, raw))
    }

    fn read_page_size(&self, key: &'static str, default: u32) -> Result<u32, ConfigError> {
        let raw = (self.0)(key).unwrap_or_else(|| default.to_string());
        match raw.trim().parse::<u32>() {
            Ok(0) => Err(ConfigError::InvalidValue(key, raw)),
            Ok(size) => Ok(size),
            Err(_) => Err(ConfigError::InvalidNumber(key, raw)),
        }
    }

    fn read_optional_string(&self, key: &'static str) -> Option<String> {
        let value = (self.0)(key).unwrap_or_default();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{AppConfig, ConfigError};

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.api_base_url, "http://127.0.0.1:8080/api");
        assert_eq!(config.api_token, None);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.page_size, 10);
        assert_eq!(config.comments_page_size, 20);
        assert_eq!(config.scroll_debounce, Duration::from_millis(500));
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("MURMUR_API_BASE_URL", " https://social.example/api "),
            ("MURMUR_API_TOKEN", "  secret "),
            ("MURMUR_PAGE_SIZE", "25"),
            ("MURMUR_SCROLL_DEBOUNCE_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.api_base_url, "https://social.example/api");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.page_size, 25);
        assert_eq!(config.scroll_debounce, Duration::from_millis(250));
    }

    #[test]
    fn blank_token_is_none() {
        let config = config(&[("MURMUR_API_TOKEN", "   ")]).unwrap();
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config(&[("MURMUR_API_BASE_URL", "  ")]),
            Err(ConfigError::InvalidValue("MURMUR_API_BASE_URL", _))
        ));
        assert!(matches!(
            config(&[("MURMUR_PAGE_SIZE", "0")]),
            Err(ConfigError::InvalidValue("MURMUR_PAGE_SIZE", _))
        ));
        assert!(matches!(
            config(&[("MURMUR_COMMENTS_PAGE_SIZE", "many")]),
            Err(ConfigError::InvalidNumber("MURMUR_COMMENTS_PAGE_SIZE", _))
        ));
        assert!(matches!(
            config(&[("MURMUR_REQUEST_TIMEOUT_SECS", "-1")]),
            Err(ConfigError::InvalidNumber("MURMUR_REQUEST_TIMEOUT_SECS", _))
        ));
    }
}
