// ABOUTME: Lifecycle notifications emitted by the orchestration core.
// ABOUTME: TracingEventSink logs them; other sinks can forward them to users.

use serde::Serialize;

use crate::types::{AppServerId, InstanceId, LoadBalancerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    SpawnStarted {
        instance: InstanceId,
        attempt: u32,
    },
    SpawnSucceeded {
        instance: InstanceId,
        appserver: AppServerId,
    },
    /// Every attempt failed.
    SpawnFailed {
        instance: InstanceId,
        attempts: u32,
    },
    ProvisioningFinished {
        appserver: AppServerId,
        status: &'static str,
    },
    AppServerActivated {
        appserver: AppServerId,
    },
    AppServerDeactivated {
        appserver: AppServerId,
    },
    AppServerTerminated {
        appserver: AppServerId,
    },
    LoadBalancerReconfigured {
        load_balancer: LoadBalancerId,
        version: u64,
    },
    InstanceArchived {
        instance: InstanceId,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

/// Logs every event at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: LifecycleEvent) {
        match &event {
            LifecycleEvent::SpawnFailed { instance, attempts } => {
                tracing::error!("instance {}: spawn failed after {} attempt(s)", instance, attempts)
            }
            _ => tracing::info!(?event, "lifecycle event"),
        }
    }
}
