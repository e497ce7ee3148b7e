// ABOUTME: Spawning new appservers for an instance with bounded retries.
// ABOUTME: Freezes a configuration snapshot per attempt and tags the instance with the outcome.

use chrono::Utc;

use crate::config::OrchestrationConfig;
use crate::fsm::ResourceState;
use crate::lifecycle::{self, ActivationOutcome};
use crate::platform::Platform;
use crate::resources::instance::{self as instance_fsm, SPAWN_APPSERVER};
use crate::resources::{AppServerStatus, ConfigurationSnapshot, Instance, NewAppServer};
use crate::services::{CapabilityError, LifecycleEvent};
use crate::types::{AppServerId, InstanceId};

use super::error::OrchestrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOptions {
    pub mark_active_on_success: bool,
    pub num_attempts: u32,
    pub success_tag: Option<String>,
    pub failure_tag: Option<String>,
}

impl SpawnOptions {
    pub fn from_config(config: &OrchestrationConfig) -> Self {
        Self {
            mark_active_on_success: config.mark_active_on_success,
            num_attempts: config.spawn_attempts,
            success_tag: config.success_tag.clone(),
            failure_tag: config.failure_tag.clone(),
        }
    }
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self::from_config(&OrchestrationConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOutcome {
    /// Every appserver created, in attempt order.
    pub appservers: Vec<AppServerId>,
    /// The appserver that reached `Running`, if any.
    pub succeeded: Option<AppServerId>,
    /// Set when activation was requested and attempted.
    pub activation: Option<ActivationOutcome>,
}

impl SpawnOutcome {
    pub fn is_success(&self) -> bool {
        self.succeeded.is_some()
    }
}

/// Create and provision appservers for `instance_id` until one runs.
pub async fn spawn_appserver(
    platform: &Platform,
    instance_id: InstanceId,
    options: &SpawnOptions,
) -> Result<SpawnOutcome, OrchestrationError> {
    let store = platform.store.as_ref();
    let instance = store.instance(instance_id).await?;
    SPAWN_APPSERVER.check(instance.key(), instance.status, instance_fsm::machine().states())?;

    let attempts = options.num_attempts.max(1);
    let mut outcome = SpawnOutcome {
        appservers: Vec::new(),
        succeeded: None,
        activation: None,
    };

    for attempt in 1..=attempts {
        platform
            .events
            .emit(LifecycleEvent::SpawnStarted {
                instance: instance_id,
                attempt,
            });

        // Re-read so each attempt freezes the settings current at its start.
        let instance = store.instance(instance_id).await?;
        if let Err(e) = provision_capabilities(platform, &instance).await {
            tracing::warn!(
                "instance {}: attempt {}/{} failed before launch: {}",
                instance_id,
                attempt,
                attempts,
                e
            );
            continue;
        }

        let now = Utc::now();
        let sequence = store.appservers_for_instance(instance_id).await?.len() + 1;
        let name = format!("{}-appserver-{}", instance.slug(), sequence);

        let server = store.create_server(&name, now).await?;
        let appserver = store
            .create_appserver(
                NewAppServer {
                    instance_id,
                    server_id: server.id,
                    name,
                    snapshot: ConfigurationSnapshot::capture(&instance, now),
                },
                now,
            )
            .await?;
        outcome.appservers.push(appserver.id);

        let status = lifecycle::provision(platform, appserver.id).await;
        if status == AppServerStatus::Running {
            outcome.succeeded = Some(appserver.id);
            break;
        }
        tracing::warn!(
            "instance {}: attempt {}/{} ended in '{}'",
            instance_id,
            attempt,
            attempts,
            status.state_id()
        );
    }

    match outcome.succeeded {
        Some(appserver) => {
            store.set_successfully_provisioned(instance_id, true).await?;
            apply_tags(
                platform,
                instance_id,
                options.success_tag.as_deref(),
                options.failure_tag.as_deref(),
            )
            .await?;
            platform.events.emit(LifecycleEvent::SpawnSucceeded {
                instance: instance_id,
                appserver,
            });
            if options.mark_active_on_success {
                outcome.activation =
                    Some(activate_replacing_others(platform, instance_id, appserver).await);
            }
        }
        None => {
            apply_tags(
                platform,
                instance_id,
                options.failure_tag.as_deref(),
                options.success_tag.as_deref(),
            )
            .await?;
            platform.events.emit(LifecycleEvent::SpawnFailed {
                instance: instance_id,
                attempts,
            });
        }
    }

    Ok(outcome)
}

/// Capability provisioning is idempotent, so every attempt runs it again.
async fn provision_capabilities(
    platform: &Platform,
    instance: &Instance,
) -> Result<(), CapabilityError> {
    for capability in &platform.capabilities {
        tracing::debug!("instance {}: provisioning {}", instance.id, capability.name());
        capability.provision(instance).await?;
    }
    Ok(())
}

async fn apply_tags(
    platform: &Platform,
    instance_id: InstanceId,
    add: Option<&str>,
    remove: Option<&str>,
) -> Result<(), OrchestrationError> {
    if let Some(tag) = add {
        platform.store.add_tag(instance_id, tag).await?;
    }
    if let Some(tag) = remove {
        platform.store.remove_tag(instance_id, tag).await?;
    }
    Ok(())
}

/// Activate `new`, then deactivate every other active appserver of the
/// instance. Failures are logged; the spawn itself already succeeded.
async fn activate_replacing_others(
    platform: &Platform,
    instance_id: InstanceId,
    new: AppServerId,
) -> ActivationOutcome {
    let outcome = match lifecycle::make_active(platform, new, true).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("appserver {}: activation after spawn failed: {}", new, e);
            return ActivationOutcome::Refused(e.to_string());
        }
    };
    if outcome != ActivationOutcome::Activated {
        return outcome;
    }

    let previous = match platform.store.appservers_for_instance(instance_id).await {
        Ok(appservers) => appservers,
        Err(e) => {
            tracing::error!("instance {}: cannot list appservers to deactivate: {}", instance_id, e);
            return outcome;
        }
    };
    for old in previous.iter().filter(|a| a.is_active && a.id != new) {
        if let Err(e) = lifecycle::make_active(platform, old.id, false).await {
            tracing::error!("appserver {}: deactivation failed: {}", old.id, e);
        }
    }
    outcome
}
