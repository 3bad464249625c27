// Server configuration, read once from the environment at startup

use std::time::Duration;
use thiserror::Error;

use crate::downloader::{ToolConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MANIFEST_TIMEOUT};

/// Bind address when neither APP_ADDR nor PORT is set
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be true or false, got {value:?}")]
    InvalidBool { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tool: ToolConfig,
    pub manifest_timeout: Duration,
    pub chunk_size: usize,
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            tool: ToolConfig::default(),
            manifest_timeout: DEFAULT_MANIFEST_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Build from process environment (after loading `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match (var("APP_ADDR"), var("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => {
                let port: u16 = port.parse().map_err(|_| ConfigError::InvalidNumber {
                    name: "PORT",
                    value: port.clone(),
                })?;
                format!("0.0.0.0:{}", port)
            }
            (None, None) => DEFAULT_BIND_ADDR.to_string(),
        };

        let tool = match var("YTDLP_PATH") {
            Some(path) => ToolConfig::default().with_path(path),
            None => ToolConfig::default(),
        };
        let tool = tool
            .with_proxy(var("YTDLP_PROXY"))
            .with_force_ipv4(parse_bool("YTDLP_FORCE_IPV4", var("YTDLP_FORCE_IPV4"))?.unwrap_or(false));

        let manifest_timeout = parse_positive("FORMATS_TIMEOUT_SECS", var("FORMATS_TIMEOUT_SECS"))?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MANIFEST_TIMEOUT);

        let chunk_size = parse_positive("STREAM_CHUNK_SIZE", var("STREAM_CHUNK_SIZE"))?
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            tool,
            manifest_timeout,
            chunk_size,
            allowed_origins,
        })
    }
}

fn parse_positive(name: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    match value {
        None => Ok(None),
        Some(value) => match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidNumber { name, value }),
        },
    }
}

fn parse_bool(name: &'static str, value: Option<String>) -> Result<Option<bool>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool { name, value }),
    }
}
