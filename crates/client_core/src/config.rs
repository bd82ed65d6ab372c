use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub storage_path: PathBuf,
    pub request_timeout_secs: u64,
    pub signup_redirect_delay_ms: u64,
    /// When false, a superseded call's late result is still applied to the
    /// store, matching the browser client's behavior.
    pub discard_stale_results: bool,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            storage_path: "./data/session.json".into(),
            request_timeout_secs: 30,
            signup_redirect_delay_ms: 1000,
            discard_stale_results: true,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.api_url.trim()).map_err(|source| ConfigError::InvalidApiUrl {
            value: self.api_url.clone(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(self.api_url.clone()));
        }
        Ok(url)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    storage_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    signup_redirect_delay_ms: Option<u64>,
    discard_stale_results: Option<bool>,
    log_filter: Option<String>,
}

/// Defaults, then `client.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(err) => warn!(
                path = %config_path.display(),
                "ignoring unreadable client config: {err}"
            ),
        }
    }

    if let Some(v) = env("PHARMACY_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("APP__STORAGE_PATH") {
        settings.storage_path = v.into();
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = env("APP__SIGNUP_REDIRECT_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.signup_redirect_delay_ms = parsed;
        }
    }

    if let Some(v) = env("APP__DISCARD_STALE_RESULTS") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.discard_stale_results = parsed;
        }
    }

    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.storage_path {
        settings.storage_path = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.signup_redirect_delay_ms {
        settings.signup_redirect_delay_ms = v;
    }
    if let Some(v) = file_cfg.discard_stale_results {
        settings.discard_stale_results = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
}
