//! Configuration Management
//!
//! Handles persistent configuration storage for ciamctl and resolves the
//! immutable [`ArmConfig`] and [`PollConfig`] values handed to the client.

use crate::arm::http::{ArmConfig, DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
use crate::arm::poller::PollConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// ARM endpoint, e.g. a sovereign cloud
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    /// Last used subscription
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Last used resource group
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ciamctl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective endpoint (CLI > config > ARM_ENDPOINT > public cloud)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.endpoint.clone())
            .or_else(|| std::env::var("ARM_ENDPOINT").ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Get effective API version (CLI > config > default)
    pub fn effective_api_version(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.api_version.clone())
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string())
    }

    /// Get effective subscription (CLI > config > ARM_SUBSCRIPTION_ID)
    pub fn effective_subscription(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.subscription_id.clone())
            .or_else(|| std::env::var("ARM_SUBSCRIPTION_ID").ok())
    }

    /// Get effective resource group (CLI > config)
    pub fn effective_resource_group(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.resource_group.clone())
    }

    pub fn arm_config(&self, endpoint: Option<&str>, api_version: Option<&str>) -> Result<ArmConfig> {
        ArmConfig::new(
            &self.effective_endpoint(endpoint),
            &self.effective_api_version(api_version),
        )
    }

    pub fn poll_config(&self, timeout_secs: Option<u64>, max_attempts: Option<u32>) -> PollConfig {
        let mut poll = PollConfig::default();
        if let Some(secs) = timeout_secs.or(self.poll_timeout_secs) {
            poll.timeout = Duration::from_secs(secs);
        }
        poll.max_attempts = max_attempts.or(self.max_poll_attempts);
        poll
    }

    /// Remember subscription and resource group and save
    pub fn set_scope(&mut self, subscription_id: &str, resource_group: &str) -> Result<()> {
        self.subscription_id = Some(subscription_id.to_string());
        self.resource_group = Some(resource_group.to_string());
        self.save()
    }
}
