//! Injected configuration for the provider client and the pipeline.

use crate::types::{Polarization, SarError, SarResult};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_AUTH_URL: &str = "https://services.sentinel-hub.com/oauth/token";
pub const DEFAULT_PROCESS_URL: &str = "https://services.sentinel-hub.com/api/v1/process";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Credentials and endpoints of the imagery provider
#[derive(Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub process_url: String,
    /// Applied to every provider call
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Config with the public Sentinel Hub endpoints and default timeout
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            process_url: DEFAULT_PROCESS_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read configuration from `SARPREP_*` environment variables
    pub fn from_env() -> SarResult<Self> {
        let client_id = required_env("SARPREP_CLIENT_ID")?;
        let client_secret = required_env("SARPREP_CLIENT_SECRET")?;
        let mut config = Self::new(client_id, client_secret);

        if let Ok(url) = std::env::var("SARPREP_AUTH_URL") {
            config.auth_url = url;
        }
        if let Ok(url) = std::env::var("SARPREP_PROCESS_URL") {
            config.process_url = url;
        }
        if let Ok(secs) = std::env::var("SARPREP_TIMEOUT_SECS") {
            config.timeout = parse_timeout_secs(&secs)?;
        }

        Ok(config)
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("process_url", &self.process_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Provider timeout in whole seconds; zero would fail every call
fn parse_timeout_secs(value: &str) -> SarResult<Duration> {
    let secs: u64 = value.trim().parse().map_err(|_| {
        SarError::Config(format!("SARPREP_TIMEOUT_SECS is not a number: {}", value))
    })?;
    if secs == 0 {
        return Err(SarError::Config("SARPREP_TIMEOUT_SECS must be at least 1".to_string()));
    }
    Ok(Duration::from_secs(secs))
}

fn required_env(name: &str) -> SarResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SarError::Config(format!("{} is not set", name))),
    }
}

/// Pipeline parameters
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Half-width of the query box, degrees
    pub margin_degrees: f64,
    pub lookback_days: i64,
    pub output_width: u32,
    pub output_height: u32,
    pub band: Polarization,
    /// Where raw and enhanced images are written
    pub artifact_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            margin_degrees: 0.05,
            lookback_days: crate::core::time_window::LOOKBACK_DAYS,
            output_width: 256,
            output_height: 256,
            band: Polarization::VH,
            artifact_dir: default_artifact_dir(),
        }
    }
}

/// Platform cache directory, or the temp dir when there is none
pub fn default_artifact_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sarprep")
}
