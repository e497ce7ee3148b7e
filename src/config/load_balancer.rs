// ABOUTME: Load balancer reconfiguration settings.
// ABOUTME: Lock timing, catch-up rounds, rendering options and the kill switch.

use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerConfig {
    /// Render empty configurations instead of real ones.
    #[serde(default)]
    pub disable_reconfiguration: bool,

    /// Time-to-live of the reconfiguration lock.
    #[serde(default = "default_lock_timeout", with = "humantime_serde")]
    pub lock_timeout: Duration,

    #[serde(default = "default_lock_poll_interval", with = "humantime_serde")]
    pub lock_poll_interval: Duration,

    /// How long deconfiguration waits for the lock before giving up.
    #[serde(default = "default_lock_wait", with = "humantime_serde")]
    pub lock_wait: Duration,

    /// Extra renders a lock holder performs when the version moved during an apply.
    #[serde(default = "default_max_catch_up_rounds")]
    pub max_catch_up_rounds: u32,

    #[serde(default)]
    pub preliminary_page: Option<PreliminaryPage>,

    /// Port the appservers serve HTTP on.
    #[serde(default = "default_backend_port")]
    pub backend_port: u16,

    /// HTTP health check path for backends; empty disables the check.
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,

    #[serde(default = "default_apply_playbook")]
    pub apply_playbook: PathBuf,
}

/// Server answering for instances that have no active appserver yet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreliminaryPage {
    pub address: IpAddr,
    #[serde(default = "default_backend_port")]
    pub port: u16,
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_lock_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_lock_wait() -> Duration {
    Duration::from_secs(600)
}

fn default_max_catch_up_rounds() -> u32 {
    3
}

fn default_backend_port() -> u16 {
    80
}

fn default_health_check_path() -> String {
    "/heartbeat".to_string()
}

fn default_apply_playbook() -> PathBuf {
    PathBuf::from("playbooks/load_balancer.yml")
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            disable_reconfiguration: false,
            lock_timeout: default_lock_timeout(),
            lock_poll_interval: default_lock_poll_interval(),
            lock_wait: default_lock_wait(),
            max_catch_up_rounds: default_max_catch_up_rounds(),
            preliminary_page: None,
            backend_port: default_backend_port(),
            health_check_path: default_health_check_path(),
            apply_playbook: default_apply_playbook(),
        }
    }
}
