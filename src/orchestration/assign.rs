// ABOUTME: Binding an instance to a load balancing server.
// ABOUTME: Picks a random server accepting new backends and reconfigures old and new.

use rand::seq::SliceRandom;

use crate::lb::Reconfigurator;
use crate::platform::Platform;
use crate::resources::instance::{self as instance_fsm, ASSIGN_LOAD_BALANCER};
use crate::types::{InstanceId, LoadBalancerId};

use super::error::OrchestrationError;

/// Bind `instance_id` to `preferred`, or to a random load balancer that
/// accepts new backends. Both the previous and the new load balancer are
/// reconfigured. Returns the chosen load balancer.
pub async fn assign_load_balancer(
    platform: &Platform,
    instance_id: InstanceId,
    preferred: Option<LoadBalancerId>,
) -> Result<LoadBalancerId, OrchestrationError> {
    let store = platform.store.as_ref();
    let instance = store.instance(instance_id).await?;
    ASSIGN_LOAD_BALANCER.check(
        instance.key(),
        instance.status,
        instance_fsm::machine().states(),
    )?;

    let target = match preferred {
        Some(id) => store.load_balancer(id).await?.id,
        None => pick_load_balancer(platform).await?,
    };

    let previous = instance.load_balancing_server;
    if previous != Some(target) {
        store.set_load_balancer(instance_id, Some(target)).await?;
        tracing::info!(
            "instance {}: load balancer {} -> {}",
            instance_id,
            previous.map_or_else(|| "none".to_string(), |id| id.to_string()),
            target
        );
    }

    let reconfigurator = Reconfigurator::new(platform);
    if let Some(old) = previous.filter(|&old| old != target) {
        reconfigurator
            .reconfigure(old, Some(instance_id), true)
            .await?;
    }
    reconfigurator
        .reconfigure(target, Some(instance_id), true)
        .await?;
    Ok(target)
}

async fn pick_load_balancer(platform: &Platform) -> Result<LoadBalancerId, OrchestrationError> {
    let candidates: Vec<LoadBalancerId> = platform
        .store
        .load_balancers()
        .await?
        .into_iter()
        .filter(|lb| lb.accepts_new_backends)
        .map(|lb| lb.id)
        .collect();
    let picked = candidates.choose(&mut rand::thread_rng()).copied();
    picked.ok_or(OrchestrationError::NoLoadBalancerAvailable)
}
