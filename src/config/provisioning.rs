// ABOUTME: Appserver provisioning settings.
// ABOUTME: Boot polling, SSH probing and the configuration playbook.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Polls before a VM that never boots is given up on.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    #[serde(default = "default_playbook")]
    pub playbook: PathBuf,

    #[serde(default = "default_ansible_playbook")]
    pub ansible_playbook: String,

    #[serde(default = "default_remote_user")]
    pub remote_user: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    #[serde(default = "default_ssh_timeout", with = "humantime_serde")]
    pub ssh_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_polls() -> u32 {
    60
}

fn default_playbook() -> PathBuf {
    PathBuf::from("playbooks/appserver.yml")
}

fn default_ansible_playbook() -> String {
    "ansible-playbook".to_string()
}

fn default_remote_user() -> String {
    "ubuntu".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_polls: default_max_polls(),
            playbook: default_playbook(),
            ansible_playbook: default_ansible_playbook(),
            remote_user: default_remote_user(),
            ssh_port: default_ssh_port(),
            ssh_timeout: default_ssh_timeout(),
        }
    }
}
