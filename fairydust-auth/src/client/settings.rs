use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::time::Duration;

const LEGACY_API_PORT: &str = ":8001";
const LEGACY_LEDGER_PORT: &str = ":8002";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app_id: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Ledger service base URL. Set this explicitly; the derived fallback only
    /// holds for the local port layout.
    #[serde(default)]
    pub ledger_url: Option<String>,
    #[serde(default = "default_top_up_url")]
    pub top_up_url: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Host page title, used in debit descriptions.
    #[serde(default)]
    pub app_name: Option<String>,
}

fn default_api_url() -> String {
    fairydust_api::DEFAULT_API_URL.to_string()
}

fn default_top_up_url() -> String {
    "https://fairydust.fun/purchase".to_string()
}

fn default_site_url() -> String {
    "https://fairydust.fun".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Settings {
    /// Loads `fairydust.toml` (or `$FAIRYDUST_CONFIG`) layered under
    /// `FAIRYDUST__*` environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("FAIRYDUST_CONFIG").unwrap_or_else(|_| "fairydust.toml".to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(config::Environment::with_prefix("FAIRYDUST").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Programmatic configuration for embedding hosts.
    pub fn for_app(app_id: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            api_url: api_url.into(),
            ledger_url: None,
            top_up_url: default_top_up_url(),
            site_url: default_site_url(),
            request_timeout_secs: default_request_timeout_secs(),
            app_name: None,
        }
    }

    pub fn with_ledger_url(mut self, ledger_url: impl Into<String>) -> Self {
        self.ledger_url = Some(ledger_url.into());
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn api_base_url(&self) -> String {
        self.api_url.trim_end_matches('/').to_string()
    }

    /// Explicit ledger URL, or the API URL with its port swapped from 8001 to 8002.
    pub fn ledger_base_url(&self) -> String {
        match &self.ledger_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => {
                let derived = self
                    .api_base_url()
                    .replace(LEGACY_API_PORT, LEGACY_LEDGER_PORT);
                tracing::warn!(
                    ledger_url = %derived,
                    "No ledger_url configured, derived from api_url"
                );
                derived
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.app_id.trim().is_empty() {
            return Err("app_id is required".to_string());
        }
        if !self.api_url.starts_with("http") {
            return Err("api_url must be a valid HTTP(S) URL".to_string());
        }
        if let Some(ledger_url) = &self.ledger_url {
            if !ledger_url.starts_with("http") {
                return Err("ledger_url must be a valid HTTP(S) URL".to_string());
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_ledger_url_wins() {
        let settings = Settings::for_app("app", "http://localhost:8001")
            .with_ledger_url("https://ledger.fairydust.fun/");
        assert_eq!(settings.ledger_base_url(), "https://ledger.fairydust.fun");
    }

    #[test]
    fn test_ledger_url_derived_from_port() {
        let settings = Settings::for_app("app", "http://localhost:8001/");
        assert_eq!(settings.ledger_base_url(), "http://localhost:8002");
    }

    #[test]
    fn test_validate() {
        assert!(Settings::for_app("app", "https://api.fairydust.fun")
            .validate()
            .is_ok());
        assert!(Settings::for_app("", "https://api.fairydust.fun")
            .validate()
            .is_err());
        assert!(Settings::for_app("app", "api.fairydust.fun")
            .validate()
            .is_err());
        assert!(Settings::for_app("app", "https://api.fairydust.fun")
            .with_ledger_url("ledger")
            .validate()
            .is_err());
    }

    #[test]
    fn test_defaults_from_minimal_config() {
        let settings: Settings = Config::builder()
            .set_override("app_id", "from-config")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.app_id, "from-config");
        assert_eq!(settings.api_url, "https://api.fairydust.fun");
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert!(settings.ledger_url.is_none());
    }
}
