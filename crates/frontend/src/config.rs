use std::collections::HashMap;

use serde::Deserialize;
use session::{Button, KeyBindings, PathLayout, SessionConfig, StartPolicy};
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_CSRF_COOKIE: &str = "csrf_access_token";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse frontend config: {message}")]
    Parse { message: String },
    #[error("parse frontend config at {path}: {message}")]
    Field { path: String, message: String },
    #[error("api_base_url must be an http(s) url, got `{0}`")]
    ApiBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrontendConfig {
    pub api_base_url: String,
    pub csrf_cookie: String,
    pub log_filter: String,
    pub start_policy: StartPolicy,
    pub route_keyboard: bool,
    pub key_bindings: HashMap<String, Button>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            csrf_cookie: DEFAULT_CSRF_COOKIE.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            start_policy: StartPolicy::AutoStart,
            route_keyboard: false,
            key_bindings: HashMap::new(),
        }
    }
}

impl FrontendConfig {
    /// Parses the JSON handed over by the page. Blank input yields the defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: Self = match serde_path_to_error::deserialize(&mut deserializer) {
            Ok(config) => config,
            Err(error) => {
                let path = error.path().to_string();
                let message = error.into_inner().to_string();
                return Err(if path.is_empty() || path == "." {
                    ConfigError::Parse { message }
                } else {
                    ConfigError::Field { path, message }
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ApiBaseUrl(self.api_base_url.clone()));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            start_policy: self.start_policy,
            layout: PathLayout::default(),
            key_bindings: KeyBindings::with_overrides(&self.key_bindings),
        }
    }
}
