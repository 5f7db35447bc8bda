//! Configuration file schema and loader.
//!
//! The file is read once at startup and is immutable afterwards. Anything
//! missing falls back to the defaults below; `buttons` and `ui_settings`
//! are passed through to the control page untouched.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_OBS_HOST: &str = "localhost";
pub const DEFAULT_OBS_PORT: u16 = 4455;

/// Errors raised while loading the configuration file. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {0}")]
    NotFound(PathBuf),
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Where the control server lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
}

fn default_host() -> String {
    DEFAULT_OBS_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_OBS_PORT
}

impl Default for ObsSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
        }
    }
}

/// One volume-controllable input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub obs_settings: ObsSettings,
    /// Ordered; the order is kept for polling and for replay to new clients.
    #[serde(default)]
    pub audio_sources: Vec<AudioSource>,
    #[serde(default)]
    pub buttons: Vec<serde_json::Value>,
    #[serde(default = "default_ui_settings")]
    pub ui_settings: serde_json::Value,
}

fn default_ui_settings() -> serde_json::Value {
    serde_json::json!({ "scene_width_percent": 65, "grid_columns": 3 })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            obs_settings: ObsSettings::default(),
            audio_sources: Vec::new(),
            buttons: Vec::new(),
            ui_settings: default_ui_settings(),
        }
    }
}

impl Config {
    /// Load from `path`. `.toml` files go through `toml`, everything else
    /// is parsed as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(&text).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            Self::from_json(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Source names in configured order.
    pub fn source_names(&self) -> Vec<String> {
        self.audio_sources.iter().map(|s| s.name.clone()).collect()
    }
}

/// Directory holding the running executable, falling back to the working directory.
pub fn base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
