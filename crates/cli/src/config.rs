//! CLI configuration: defaults, optional file, then `AUTHFLOW__*` environment

use anyhow::Result;
use authflow_http::ApiClientBuilder;
use authflow_session::AuthConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Backend connection settings
    pub api: ApiSettings,

    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL the API paths are appended to
    pub base_url: String,

    /// Request timeout in seconds; the transport default applies when unset
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: AuthConfig::DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            user_agent: None,
        }
    }
}

impl Settings {
    /// Load configuration with defaults, an optional file and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value cannot be parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("AUTHFLOW").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    #[cfg(test)]
    fn from_toml(contents: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Self::default();
        Ok(config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("log_level", defaults.log_level)?)
    }

    /// Client builder reflecting these settings
    pub fn client_builder(&self) -> ApiClientBuilder {
        let mut builder = ApiClientBuilder::default().base_url(self.api.base_url.clone());
        if let Some(secs) = self.api.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(agent) = &self.api.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api.base_url, "http://localhost:8000");
        assert!(settings.api.timeout_secs.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = Settings::from_toml(
            r#"
            log_level = "debug"

            [api]
            base_url = "https://auth.example.com"
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.api.base_url, "https://auth.example.com");
        assert_eq!(settings.api.timeout_secs, Some(10));
    }

    #[test]
    fn client_builder_uses_configured_base_url() {
        let mut settings = Settings::default();
        settings.api.base_url = "https://auth.example.com/".into();
        let client = settings.client_builder().build().unwrap();
        assert_eq!(client.base_url(), "https://auth.example.com");
    }
}
