//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use crate::proposal::{MessageLocale, TransitionPolicy};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Where proposals and notifications live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// JSON documents under `data_dir`
    File,
    /// Lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("expected 'file' or 'memory', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Review workflow configuration
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub policy: TransitionPolicy,
    pub locale: MessageLocale,
    /// Longest a refresh long-poll waits
    pub refresh_poll: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            policy: TransitionPolicy::Permissive,
            locale: MessageLocale::English,
            refresh_poll: Duration::from_secs(25),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    pub workflow: WorkflowConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source; unset variables take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let server = ServerConfig {
            host: parse_var(&lookup, "HOST", defaults.server.host)?,
            port: parse_var(&lookup, "PORT", defaults.server.port)?,
        };

        let cors = CorsConfig {
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors.allowed_origins),
        };

        let storage = StorageConfig {
            backend: parse_var(&lookup, "STORAGE_BACKEND", defaults.storage.backend)?,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.data_dir),
        };

        let workflow = WorkflowConfig {
            policy: parse_var(&lookup, "TRANSITION_POLICY", defaults.workflow.policy)?,
            locale: parse_var(&lookup, "MESSAGE_LOCALE", defaults.workflow.locale)?,
            refresh_poll: parse_var(&lookup, "REFRESH_POLL_SECONDS", defaults.workflow.refresh_poll.as_secs())
                .map(Duration::from_secs)?,
        };

        Ok(Self {
            server,
            cors,
            storage,
            workflow,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                var: name.to_string(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
