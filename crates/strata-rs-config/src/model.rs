//! Configuration schema for Strata.

use crate::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strata_rs_protocol::RecencyLimit;

/// Root config for the storage adapter.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StrataConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl StrataConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> StrataConfigBuilder {
        StrataConfigBuilder::new()
    }
}

/// Builder for assembling a `StrataConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct StrataConfigBuilder {
    config: StrataConfig,
}

impl StrataConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StrataConfig::default(),
        }
    }

    /// Replace the storage backend settings.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Use the in-memory backend.
    pub fn in_memory(mut self) -> Self {
        self.config.storage.backend = StorageBackend::Memory;
        self
    }

    /// Use the file backend rooted at `path`.
    pub fn file_backend(mut self, path: impl Into<String>) -> Self {
        self.config.storage = StorageConfig {
            backend: StorageBackend::File,
            path: Some(path.into()),
        };
        self
    }

    /// Set the default recency limit for message windows.
    pub fn last_messages(mut self, limit: RecencyLimit) -> Self {
        self.config.window.last_messages = limit;
        self
    }

    /// Replace the pagination settings.
    pub fn pagination(mut self, pagination: PaginationConfig) -> Self {
        self.config.pagination = pagination;
        self
    }

    /// Finalize and validate the config.
    pub fn build(self) -> Result<StrataConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Which row store backs the adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local tables, lost on exit.
    Memory,
    /// JSONL files under `storage.path`.
    #[default]
    File,
}

/// Row store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Data directory for the file backend; defaults to `~/.strata/data`.
    #[serde(default)]
    pub path: Option<String>,
}

impl StorageConfig {
    /// Directory the file backend writes to.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.path {
            return Ok(PathBuf::from(path));
        }
        UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".strata").join("data"))
            .ok_or(ConfigError::NoHomeDir("storage.path"))
    }
}

/// Message window defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WindowConfig {
    /// Recency limit used when a request leaves it unset; `false` disables it.
    #[serde(default)]
    pub last_messages: RecencyLimit,
}

/// Page sizes for cursor loops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginationConfig {
    #[serde(default = "default_thread_page_size")]
    pub thread_page_size: usize,
    #[serde(default = "default_trace_page_size")]
    pub trace_page_size: usize,
    #[serde(default = "default_clear_page_size")]
    pub clear_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            thread_page_size: default_thread_page_size(),
            trace_page_size: default_trace_page_size(),
            clear_page_size: default_clear_page_size(),
        }
    }
}

fn default_thread_page_size() -> usize {
    100
}

fn default_trace_page_size() -> usize {
    100
}

fn default_clear_page_size() -> usize {
    1000
}
