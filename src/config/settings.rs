use serde::{Deserialize, Serialize};
use std::path::Path;

use super::deployment::DeploymentConfig;
use crate::error::{RelayError, Result};

/// Environment variable carrying the hosting backend's endpoint name,
/// bound at deployment time.
pub const ENDPOINT_NAME_ENV: &str = "SAGEMAKER_ENDPOINT_NAME";
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";
pub const BACKEND_URL_ENV: &str = "RELAY_BACKEND_URL";
pub const API_KEYS_ENV: &str = "RELAY_API_KEYS";
/// Hosted endpoints reject invocation payloads above 6 MB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub backend: BackendSettings,
    pub gateway: GatewaySettings,
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Larger request bodies get 413 once the API key has been checked.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    /// `{endpoint_name}` is substituted with the resolved endpoint name.
    pub invocations_path: String,
    pub endpoint_name: Option<String>,
    /// Sent as a bearer token when the backend sits behind an auth proxy.
    pub auth_token: Option<String>,
    /// Unset keeps the HTTP client's own default.
    pub timeout_secs: Option<u64>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            invocations_path: "/endpoints/{endpoint_name}/invocations".to_string(),
            endpoint_name: None,
            auth_token: None,
            timeout_secs: None,
        }
    }
}

impl BackendSettings {
    pub fn invocation_url(&self, endpoint_name: &str) -> String {
        let path = self.invocations_path.replace("{endpoint_name}", endpoint_name);
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub api_keys: Vec<String>,
    // 整个 stage 的限流
    pub stage_rate_limit: u32,
    pub stage_burst_limit: u32,
    // 每个 API key 的 usage plan
    pub rate_limit: u32,
    pub burst_limit: u32,
    pub daily_quota: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            stage_rate_limit: 100,
            stage_burst_limit: 200,
            rate_limit: 50,
            burst_limit: 100,
            daily_quota: 10_000,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut settings = match Self::find_config_file() {
            Some(path) => Self::load_from(&path)?,
            None => {
                tracing::warn!(
                    "No custom-config.toml or config.toml found; using defaults and environment"
                );
                Settings::default()
            }
        };
        settings.apply_overrides(|name| std::env::var(name).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn find_config_file() -> Option<String> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(path);
        }
        ["custom-config.toml", "config.toml"]
            .iter()
            .find(|name| Path::new(name).exists())
            .map(|name| name.to_string())
    }

    /// Environment values win over the file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(name) = non_empty(ENDPOINT_NAME_ENV) {
            self.backend.endpoint_name = Some(name.trim().to_string());
        }
        if let Some(url) = non_empty(BACKEND_URL_ENV) {
            self.backend.base_url = url.trim().to_string();
        }
        if let Some(keys) = non_empty(API_KEYS_ENV) {
            self.gateway.api_keys = keys
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gateway.api_keys.iter().any(|k| !k.trim().is_empty()) {
            return Err(RelayError::Config(format!(
                "at least one API key is required (gateway.api_keys or {})",
                API_KEYS_ENV
            )));
        }
        let limits = [
            ("stage_rate_limit", self.gateway.stage_rate_limit),
            ("stage_burst_limit", self.gateway.stage_burst_limit),
            ("rate_limit", self.gateway.rate_limit),
            ("burst_limit", self.gateway.burst_limit),
            ("daily_quota", self.gateway.daily_quota),
        ];
        if let Some((field, _)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(RelayError::Config(format!("gateway.{} must be > 0", field)));
        }
        if self.server.max_body_bytes == 0 {
            return Err(RelayError::Config(
                "server.max_body_bytes must be > 0".to_string(),
            ));
        }
        if reqwest::Url::parse(&self.backend.base_url).is_err() {
            return Err(RelayError::Config(format!(
                "backend.base_url is not a valid URL: {}",
                self.backend.base_url
            )));
        }
        self.deployment.production_variant()?;
        Ok(())
    }

    /// Explicit backend setting, else the name the deployment would provision.
    pub fn endpoint_name(&self) -> String {
        self.backend
            .endpoint_name
            .clone()
            .unwrap_or_else(|| self.deployment.endpoint_name())
    }
}
