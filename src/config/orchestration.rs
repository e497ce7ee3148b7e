// ABOUTME: Instance orchestration settings.
// ABOUTME: Spawn attempts, outcome tags and appserver retention.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "default_spawn_attempts")]
    pub spawn_attempts: u32,

    #[serde(default)]
    pub mark_active_on_success: bool,

    #[serde(default)]
    pub success_tag: Option<String>,

    #[serde(default)]
    pub failure_tag: Option<String>,

    /// Days a non-active appserver is kept before it may be terminated.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_spawn_attempts() -> u32 {
    2
}

fn default_retention_days() -> u32 {
    2
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            spawn_attempts: default_spawn_attempts(),
            mark_active_on_success: false,
            success_tag: None,
            failure_tag: None,
            retention_days: default_retention_days(),
        }
    }
}
