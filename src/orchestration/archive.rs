// ABOUTME: Best-effort instance teardown ending in the Archived state.
// ABOUTME: Every teardown failure becomes a diagnostics warning; none aborts the archive.

use crate::diagnostics::{Diagnostics, Warning};
use crate::lb::Reconfigurator;
use crate::lifecycle::{self, remove_domain_records};
use crate::platform::Platform;
use crate::resources::InstanceStatus;
use crate::resources::instance::{self as instance_fsm, ARCHIVE};
use crate::services::LifecycleEvent;
use crate::types::InstanceId;

use super::error::OrchestrationError;

/// Tear down everything `instance_id` owns and mark it archived.
///
/// Order: monitoring, DNS, load balancer, appservers, capabilities in
/// reverse provisioning order, then the state transition. Only a failure
/// to read the instance or to record the transition is an error.
pub async fn archive(
    platform: &Platform,
    instance_id: InstanceId,
) -> Result<Diagnostics, OrchestrationError> {
    let store = platform.store.as_ref();
    let mut diagnostics = Diagnostics::default();
    let instance = store.instance(instance_id).await?;

    if instance.status == InstanceStatus::Archived {
        tracing::info!("instance {}: already archived", instance_id);
        return Ok(diagnostics);
    }
    instance_fsm::machine().check(instance.key(), instance.status, &ARCHIVE)?;
    tracing::info!("instance {}: archiving", instance_id);

    if let Some(monitoring) = &platform.monitoring
        && let Some(reason) = monitoring.disable(&instance).await.failure()
    {
        diagnostics.warn(Warning::monitoring(format!(
            "instance {instance_id}: failed to disable monitoring: {reason}"
        )));
    }

    for (domain, outcome) in remove_domain_records(platform, &instance).await {
        if let Some(reason) = outcome.failure() {
            diagnostics.warn(Warning::dns(format!(
                "instance {instance_id}: failed to remove DNS record for {domain}: {reason}"
            )));
        }
    }

    if let Some(lb) = instance.load_balancing_server {
        match store.set_load_balancer(instance_id, None).await {
            Ok(()) => {
                if let Err(e) = Reconfigurator::new(platform)
                    .reconfigure(lb, Some(instance_id), true)
                    .await
                {
                    diagnostics.warn(Warning::load_balancer(format!(
                        "instance {instance_id}: load balancer {lb} not reconfigured: {e}"
                    )));
                }
            }
            Err(e) => diagnostics.warn(Warning::load_balancer(format!(
                "instance {instance_id}: failed to detach from load balancer {lb}: {e}"
            ))),
        }
    }

    teardown_appservers(platform, instance_id, &mut diagnostics).await;

    for capability in platform.capabilities.iter().rev() {
        if let Some(reason) = capability.deprovision(&instance).await.failure() {
            diagnostics.warn(Warning::capability(format!(
                "instance {instance_id}: failed to deprovision {}: {reason}",
                capability.name()
            )));
        }
    }

    instance_fsm::machine()
        .apply(store, instance.key(), &ARCHIVE)
        .await?;
    platform.events.emit(LifecycleEvent::InstanceArchived {
        instance: instance_id,
    });
    tracing::info!(
        "instance {}: archived with {} warning(s)",
        instance_id,
        diagnostics.warnings().len()
    );
    Ok(diagnostics)
}

/// Deactivate and terminate every appserver. The load balancer no longer
/// routes to the instance, so deactivation only flips the flag.
async fn teardown_appservers(
    platform: &Platform,
    instance_id: InstanceId,
    diagnostics: &mut Diagnostics,
) {
    let store = platform.store.as_ref();
    let appservers = match store.appservers_for_instance(instance_id).await {
        Ok(appservers) => appservers,
        Err(e) => {
            diagnostics.warn(Warning::appserver(format!(
                "instance {instance_id}: cannot list appservers: {e}"
            )));
            return;
        }
    };

    for appserver in appservers.iter().filter(|a| !a.is_terminated()) {
        if appserver.is_active {
            if let Err(e) = store.set_appserver_active(appserver.id, false, None).await {
                diagnostics.warn(Warning::appserver(format!(
                    "appserver {}: failed to deactivate: {e}",
                    appserver.id
                )));
                continue;
            }
            platform.events.emit(LifecycleEvent::AppServerDeactivated {
                appserver: appserver.id,
            });
        }
        if let Err(e) = lifecycle::terminate_vm(platform, appserver.id).await {
            diagnostics.warn(Warning::appserver(format!(
                "appserver {}: failed to terminate: {e}",
                appserver.id
            )));
        }
    }
}
