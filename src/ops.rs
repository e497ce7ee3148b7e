// ABOUTME: Operations exposed to the outer surfaces (CLI, API, admin tools).
// ABOUTME: Every expected failure becomes an OperationOutcome instead of an error.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::fsm::{ResourceState, StateMachine};
use crate::lb::{AggregationError, Aggregator, LoadBalancerConfiguration};
use crate::lifecycle::{self, ActivationOutcome};
use crate::orchestration::{self, RetentionPlan, SpawnOptions};
use crate::platform::Platform;
use crate::resources::appserver::{self, MAKE_ACTIVE};
use crate::resources::instance::{self, ASSIGN_LOAD_BALANCER, SPAWN_APPSERVER};
use crate::resources::server;
use crate::store::{ResourceKey, ResourceKind, StoreError};
use crate::types::{AppServerId, InstanceId, LoadBalancerId, ServerId};

/// Result of a side-effecting operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
    /// Resource the operation created, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceKey>,
}

impl OperationOutcome {
    fn succeeded(message: impl Into<String>, resource: Option<ResourceKey>) -> Self {
        Self {
            success: true,
            message: message.into(),
            resource,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            resource: None,
        }
    }
}

/// Current state of a resource and what can be done with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceStatus {
    pub resource: ResourceKey,
    pub state_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub available_operations: Vec<&'static str>,
}

pub struct Operations<'a> {
    platform: &'a Platform,
}

impl<'a> Operations<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self { platform }
    }

    pub async fn status(&self, resource: ResourceKey) -> Result<ResourceStatus, StoreError> {
        let store = self.platform.store.as_ref();
        match resource.kind {
            ResourceKind::Instance => {
                let instance = store.instance(InstanceId::new(resource.id)).await?;
                let mut ops = transitions_from(instance::machine(), instance.status);
                for guard in [SPAWN_APPSERVER, ASSIGN_LOAD_BALANCER] {
                    if guard.is_available(instance.status) {
                        ops.push(guard.operation());
                    }
                }
                Ok(describe(resource, instance.status, ops))
            }
            ResourceKind::AppServer => {
                let appserver = store.appserver(AppServerId::new(resource.id)).await?;
                let mut ops = transitions_from(appserver::machine(), appserver.status);
                if MAKE_ACTIVE.is_available(appserver.status) {
                    ops.push(if appserver.is_active {
                        "make_inactive"
                    } else {
                        "make_active"
                    });
                }
                if !appserver.is_active && !appserver.is_terminated() {
                    ops.push("terminate_vm");
                }
                Ok(describe(resource, appserver.status, ops))
            }
            ResourceKind::Server => {
                let server = store.server(ServerId::new(resource.id)).await?;
                let ops = transitions_from(server::machine(), server.status);
                Ok(describe(resource, server.status, ops))
            }
            ResourceKind::LoadBalancer => {
                let lb = store.load_balancer(LoadBalancerId::new(resource.id)).await?;
                let (state_id, name, description) = if lb.is_dirty() {
                    ("dirty", "Dirty", "Configuration changed since the last apply.")
                } else {
                    ("clean", "Clean", "The deployed configuration is current.")
                };
                Ok(ResourceStatus {
                    resource,
                    state_id,
                    name,
                    description,
                    available_operations: vec!["reconfigure", "render"],
                })
            }
        }
    }

    pub async fn spawn_appserver(
        &self,
        instance: InstanceId,
        options: &SpawnOptions,
    ) -> OperationOutcome {
        match orchestration::spawn_appserver(self.platform, instance, options).await {
            Ok(outcome) => match outcome.succeeded {
                Some(id) => OperationOutcome::succeeded(
                    format!(
                        "appserver {} running after {} attempt(s)",
                        id,
                        outcome.appservers.len()
                    ),
                    Some(id.into()),
                ),
                None => OperationOutcome {
                    success: false,
                    message: format!(
                        "spawn failed after {} attempt(s)",
                        outcome.appservers.len()
                    ),
                    resource: outcome.appservers.last().map(|&id| id.into()),
                },
            },
            Err(e) => OperationOutcome::failed(e.to_string()),
        }
    }

    pub async fn make_active(&self, appserver: AppServerId, active: bool) -> OperationOutcome {
        match lifecycle::make_active(self.platform, appserver, active).await {
            Ok(ActivationOutcome::Activated) => {
                OperationOutcome::succeeded(format!("appserver {appserver} activated"), None)
            }
            Ok(ActivationOutcome::Deactivated) => {
                OperationOutcome::succeeded(format!("appserver {appserver} deactivated"), None)
            }
            Ok(ActivationOutcome::Refused(reason)) => OperationOutcome::failed(reason),
            Err(e) => OperationOutcome::failed(e.to_string()),
        }
    }

    pub async fn terminate_vm(&self, appserver: AppServerId) -> OperationOutcome {
        match lifecycle::terminate_vm(self.platform, appserver).await {
            Ok(()) => {
                OperationOutcome::succeeded(format!("appserver {appserver} terminated"), None)
            }
            Err(e) => OperationOutcome::failed(e.to_string()),
        }
    }

    pub async fn archive(&self, instance: InstanceId) -> OperationOutcome {
        match orchestration::archive(self.platform, instance).await {
            Ok(diagnostics) if diagnostics.has_warnings() => OperationOutcome::succeeded(
                format!(
                    "instance {} archived with {} warning(s)",
                    instance,
                    diagnostics.warnings().len()
                ),
                None,
            ),
            Ok(_) => OperationOutcome::succeeded(format!("instance {instance} archived"), None),
            Err(e) => OperationOutcome::failed(e.to_string()),
        }
    }

    /// Render the configuration `lb` would get now, without applying it.
    pub async fn render_load_balancer(
        &self,
        lb: LoadBalancerId,
    ) -> Result<LoadBalancerConfiguration, AggregationError> {
        let lb = self.platform.store.load_balancer(lb).await?;
        Aggregator::new(self.platform).configuration(&lb, None).await
    }

    /// The retention plan for `instance` without terminating anything.
    pub async fn plan_retention(
        &self,
        instance: InstanceId,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<RetentionPlan, StoreError> {
        let appservers = self.platform.store.appservers_for_instance(instance).await?;
        Ok(RetentionPlan::compute(&appservers, days, now))
    }
}

fn transitions_from<S: ResourceState>(machine: &StateMachine<S>, current: S) -> Vec<&'static str> {
    machine
        .transitions()
        .iter()
        .filter(|t| machine.can_apply(current, t))
        .map(|t| t.name())
        .collect()
}

fn describe<S: ResourceState>(
    resource: ResourceKey,
    state: S,
    available_operations: Vec<&'static str>,
) -> ResourceStatus {
    ResourceStatus {
        resource,
        state_id: state.state_id(),
        name: state.name(),
        description: state.description(),
        available_operations,
    }
}
