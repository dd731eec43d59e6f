//! Configuration for binding a contract from the command line.
//!
//! This crate provides:
//! - The TOML configuration file format
//! - Loading of JSON ABI descriptors, raw or wrapped in a build artifact

mod descriptor;

pub use descriptor::{extract_abi, load_descriptor};

use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid descriptor {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// JSON-RPC endpoint url
    pub rpc_url: String,

    /// Contract address, `0x` followed by 40 hex digits
    pub address: String,

    /// JSON ABI file, relative paths resolve against the working directory
    pub abi_path: PathBuf,

    /// Interval between new block polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a confirmation listener waits before it is retired
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
}

const fn default_poll_interval_ms() -> u64 {
    1_000
}

const fn default_confirmation_timeout_ms() -> u64 {
    2_000
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn load_descriptor(&self) -> Result<serde_json::Value, ConfigError> {
        load_descriptor(&self.abi_path)
    }
}
