use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::monitor::sweep::SweepDelays;

const ENV_PREFIX: &str = "QUOTAWATCH_";

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_webhook_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub data_dir: String,
    pub log_dir: String,
    pub control_address: String,
    /// Per-request timeout of the balance client. Zero disables it.
    pub request_timeout_seconds: u64,
    pub gated_delay_ms: u64,
    pub force_delay_ms: u64,
    pub startup_check_delay_seconds: u64,
    pub webhook: Option<WebhookConfig>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialMonitorConfig {
    data_dir: Option<String>,
    log_dir: Option<String>,
    control_address: Option<String>,
    request_timeout_seconds: Option<u64>,
    gated_delay_ms: Option<u64>,
    force_delay_ms: Option<u64>,
    startup_check_delay_seconds: Option<u64>,
    webhook: Option<WebhookConfig>,
    // Flat webhook overrides; environment variables cannot express the table.
    webhook_url: Option<String>,
    webhook_method: Option<String>,
    webhook_body_template: Option<String>,
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_control_address() -> String {
    "127.0.0.1:7878".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_layers(PartialMonitorConfig::default(), PartialMonitorConfig::default())
    }
}

impl MonitorConfig {
    /// Loads configuration from an optional TOML file, with `QUOTAWATCH_*`
    /// environment variables (and `.env`) taking precedence over file values.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigLoadError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path_str) => read_file_layer(Path::new(path_str))?,
            None => PartialMonitorConfig::default(),
        };
        let env_config = envy::prefixed(ENV_PREFIX).from_env::<PartialMonitorConfig>()?;

        Ok(Self::from_layers(file_config, env_config))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let file_config: PartialMonitorConfig = toml::from_str(contents)?;
        Ok(Self::from_layers(file_config, PartialMonitorConfig::default()))
    }

    fn from_layers(mut file: PartialMonitorConfig, mut env: PartialMonitorConfig) -> Self {
        let webhook = merge_webhook(&mut file, &mut env);
        MonitorConfig {
            data_dir: env.data_dir.or(file.data_dir).unwrap_or_else(default_data_dir),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            control_address: env
                .control_address
                .or(file.control_address)
                .unwrap_or_else(default_control_address),
            request_timeout_seconds: env
                .request_timeout_seconds
                .or(file.request_timeout_seconds)
                .unwrap_or(30),
            gated_delay_ms: env.gated_delay_ms.or(file.gated_delay_ms).unwrap_or(1000),
            force_delay_ms: env.force_delay_ms.or(file.force_delay_ms).unwrap_or(500),
            startup_check_delay_seconds: env
                .startup_check_delay_seconds
                .or(file.startup_check_delay_seconds)
                .unwrap_or(5),
            webhook,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_seconds > 0).then(|| Duration::from_secs(self.request_timeout_seconds))
    }

    pub fn sweep_delays(&self) -> SweepDelays {
        SweepDelays {
            gated: Duration::from_millis(self.gated_delay_ms),
            forced: Duration::from_millis(self.force_delay_ms),
        }
    }

    pub fn startup_check_delay(&self) -> Duration {
        Duration::from_secs(self.startup_check_delay_seconds)
    }

    pub fn store_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn indicator_path(&self) -> PathBuf {
        self.store_dir().join("badge.json")
    }
}

fn read_file_layer(path: &Path) -> Result<PartialMonitorConfig, ConfigLoadError> {
    if !path.exists() {
        return Ok(PartialMonitorConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_webhook(
    file: &mut PartialMonitorConfig,
    env: &mut PartialMonitorConfig,
) -> Option<WebhookConfig> {
    let table = env.webhook.take().or(file.webhook.take());
    let base = match (env.webhook_url.take().or(file.webhook_url.take()), table) {
        (Some(url), Some(table)) => Some(WebhookConfig { url, ..table }),
        (Some(url), None) => Some(WebhookConfig {
            url,
            method: default_webhook_method(),
            headers: None,
            body_template: None,
        }),
        (None, table) => table,
    };
    base.map(|mut webhook| {
        if let Some(method) = env.webhook_method.take().or(file.webhook_method.take()) {
            webhook.method = method;
        }
        if let Some(template) = env.webhook_body_template.take().or(file.webhook_body_template.take()) {
            webhook.body_template = Some(template);
        }
        webhook
    })
}
