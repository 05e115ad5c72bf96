//! Application configuration
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::storage::StorageConfig;

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Verbosity level for logging (from the command line only)
    #[serde(skip)]
    pub verbose: u8,
    /// Address the HTTP API binds to
    pub listen_addr: SocketAddr,
    /// Deployment namespace attached to service spans
    pub namespace: String,
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verbose: 0,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8083)),
            namespace: "local".to_string(),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (if given) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.merge_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override fields from a key lookup (environment-variable names)
    pub fn merge_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("STATS_LISTEN_ADDR") {
            self.listen_addr = addr
                .parse()
                .with_context(|| format!("Invalid STATS_LISTEN_ADDR {addr:?}"))?;
        }
        if let Some(namespace) = lookup("NAMESPACE").filter(|s| !s.is_empty()) {
            self.namespace = namespace;
        }
        self.storage = self.storage.merge_lookup(&lookup)?;
        Ok(self)
    }

    /// Set the verbosity level
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            2 => "trace",
            _ => "trace,hyper=debug,tower=debug",
        }
    }
}
