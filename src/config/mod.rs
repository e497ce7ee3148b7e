// ABOUTME: Configuration types and parsing for hangar.yml.
// ABOUTME: Handles YAML parsing, discovery, defaults and validation.

mod dns;
mod env_value;
mod init;
mod load_balancer;
mod orchestration;
mod provisioning;

pub use dns::DnsConfig;
pub use env_value::EnvValue;
pub use init::init_config;
pub use load_balancer::{LoadBalancerConfig, PreliminaryPage};
pub use orchestration::OrchestrationConfig;
pub use provisioning::ProvisioningConfig;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "hangar.yml";
pub const CONFIG_FILENAME_ALT: &str = "hangar.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".hangar/config.yml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub load_balancer: LoadBalancerConfig,

    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    #[serde(default)]
    pub dns: Option<DnsConfig>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(Error::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Reject values that would make polling or retry loops degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.provisioning.max_polls == 0 {
            return Err(Error::InvalidConfig(
                "provisioning.max_polls must be at least 1".to_string(),
            ));
        }
        if self.provisioning.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "provisioning.poll_interval must be non-zero".to_string(),
            ));
        }
        if self.orchestration.spawn_attempts == 0 {
            return Err(Error::InvalidConfig(
                "orchestration.spawn_attempts must be at least 1".to_string(),
            ));
        }
        if self.load_balancer.lock_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "load_balancer.lock_timeout must be non-zero".to_string(),
            ));
        }
        if self.load_balancer.lock_poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "load_balancer.lock_poll_interval must be non-zero".to_string(),
            ));
        }
        if let (Some(success), Some(failure)) = (
            &self.orchestration.success_tag,
            &self.orchestration.failure_tag,
        ) && success == failure
        {
            return Err(Error::InvalidConfig(format!(
                "orchestration success and failure tags are both '{success}'"
            )));
        }
        Ok(())
    }

    pub fn template() -> Self {
        Config {
            dns: Some(DnsConfig::template()),
            ..Config::default()
        }
    }
}
