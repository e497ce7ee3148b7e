// ABOUTME: Appserver activation and termination.
// ABOUTME: Activation reconfigures the load balancer before DNS moves traffic.

use chrono::Utc;

use crate::fsm::ResourceState;
use crate::lb::Reconfigurator;
use crate::platform::Platform;
use crate::resources::appserver::{self, MAKE_ACTIVE};
use crate::resources::server;
use crate::resources::{AppServerGroup, AppServerStatus};
use crate::services::{DeleteOutcome, LifecycleEvent};
use crate::types::AppServerId;

use super::dns::point_domains_at_load_balancer;
use super::error::LifecycleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    Deactivated,
    /// Activation was not attempted; nothing changed.
    Refused(String),
}

/// Turn `id` on or off as a backend of its instance.
///
/// Activation requires a healthy appserver on a healthy server and is
/// refused otherwise. The flag flips first, then the load balancer is
/// reconfigured from it; if that fails the flag is restored. DNS is only
/// touched after the load balancer serves the new backend set.
pub async fn make_active(
    platform: &Platform,
    id: AppServerId,
    active: bool,
) -> Result<ActivationOutcome, LifecycleError> {
    let store = platform.store.as_ref();
    let appserver = store.appserver(id).await?;
    MAKE_ACTIVE.check(appserver.key(), appserver.status, appserver::machine().states())?;

    if active {
        let server = store.server(appserver.server_id).await?;
        if !appserver.status.is_a(AppServerGroup::Healthy) || !server.is_healthy() {
            let reason = format!(
                "appserver {} is not healthy (status '{}', server '{}')",
                id,
                appserver.status.state_id(),
                server.status.state_id()
            );
            tracing::warn!("Refusing activation: {}", reason);
            return Ok(ActivationOutcome::Refused(reason));
        }
    }

    let instance = store.instance(appserver.instance_id).await?;
    let was_active = appserver.is_active;
    store
        .set_appserver_active(id, active, active.then(Utc::now))
        .await?;

    match instance.load_balancing_server {
        Some(lb) => {
            if let Err(e) = Reconfigurator::new(platform)
                .reconfigure(lb, Some(instance.id), true)
                .await
            {
                tracing::error!("appserver {}: load balancer update failed, reverting: {}", id, e);
                store.set_appserver_active(id, was_active, None).await?;
                return Err(e.into());
            }
        }
        None => tracing::warn!(
            "instance {}: no load balancer, appserver {} serves no traffic",
            instance.id,
            id
        ),
    }

    if active {
        point_domains_at_load_balancer(platform, &instance).await?;
        platform
            .events
            .emit(LifecycleEvent::AppServerActivated { appserver: id });
        tracing::info!("appserver {}: activated", id);
        Ok(ActivationOutcome::Activated)
    } else {
        platform
            .events
            .emit(LifecycleEvent::AppServerDeactivated { appserver: id });
        tracing::info!("appserver {}: deactivated", id);
        Ok(ActivationOutcome::Deactivated)
    }
}

/// Delete the appserver's VM and mark both records terminated.
pub async fn terminate_vm(platform: &Platform, id: AppServerId) -> Result<(), LifecycleError> {
    let store = platform.store.as_ref();
    let appserver = store.appserver(id).await?;

    if appserver.status == AppServerStatus::Terminated {
        tracing::debug!("appserver {}: already terminated", id);
        return Ok(());
    }
    if appserver.is_active {
        return Err(LifecycleError::ActiveAppServer(id));
    }

    let server = store.server(appserver.server_id).await?;
    if let Some(vm_id) = &server.vm_id {
        match platform.compute.delete_vm(vm_id).await {
            DeleteOutcome::Deleted => tracing::info!("server {}: VM {} deleted", server.id, vm_id),
            DeleteOutcome::AlreadyAbsent => {
                tracing::info!("server {}: VM {} was already gone", server.id, vm_id)
            }
            DeleteOutcome::Failed(reason) => {
                return Err(LifecycleError::VmDeleteFailed {
                    server: server.id,
                    vm_id: vm_id.clone(),
                    reason,
                });
            }
        }
    }

    if server.status != server::ServerStatus::Terminated {
        server::machine()
            .apply(store, server.key(), &server::TERMINATE)
            .await?;
    }
    appserver::machine()
        .apply(store, appserver.key(), &appserver::TERMINATE)
        .await?;
    store.set_appserver_terminated(id, Utc::now()).await?;

    platform
        .events
        .emit(LifecycleEvent::AppServerTerminated { appserver: id });
    tracing::info!("appserver {}: terminated", id);
    Ok(())
}
