// ABOUTME: Version-tracked, lock-serialized load balancer reconfiguration.
// ABOUTME: Marks servers dirty, applies the latest rendering and catches up on concurrent changes.

use futures::future::join_all;
use snafu::ResultExt;

use crate::platform::Platform;
use crate::services::LifecycleEvent;
use crate::types::{InstanceId, LoadBalancerId};

use super::aggregator::Aggregator;
use super::error::{
    AggregationSnafu, LockSnafu, ReconfigurationError, ReconfigurationFailedSnafu, StoreSnafu,
};
use super::lock::ReconfigureLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigureOutcome {
    /// `version` is live on the server after `rounds` applies.
    Applied { version: u64, rounds: u32 },
    /// Another reconfiguration holds the lock; it or the next sweep will
    /// pick up the pending version.
    Deferred,
    /// Reconfiguration is administratively disabled.
    Disabled,
}

pub struct Reconfigurator<'a> {
    platform: &'a Platform,
}

impl<'a> Reconfigurator<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self { platform }
    }

    /// Bring `lb` up to date.
    ///
    /// With `mark_dirty` the configuration version is bumped first, so a
    /// reconfiguration that is already running will notice and catch up.
    pub async fn reconfigure(
        &self,
        lb: LoadBalancerId,
        triggering: Option<InstanceId>,
        mark_dirty: bool,
    ) -> Result<ReconfigureOutcome, ReconfigurationError> {
        let store = &self.platform.store;
        let settings = &self.platform.config.load_balancer;

        if mark_dirty {
            let version = store
                .increment_configuration_version(lb)
                .await
                .context(StoreSnafu)?;
            tracing::debug!("load balancer {}: configuration version now {}", lb, version);
        }

        if settings.disable_reconfiguration {
            tracing::info!("load balancer {}: reconfiguration disabled, skipping", lb);
            return Ok(ReconfigureOutcome::Disabled);
        }

        let Some(lock) =
            ReconfigureLock::try_acquire(self.platform.locks.as_ref(), lb, settings.lock_timeout)
                .await
                .context(LockSnafu { lb })?
        else {
            tracing::info!(
                "load balancer {}: another reconfiguration is in progress, deferring",
                lb
            );
            return Ok(ReconfigureOutcome::Deferred);
        };

        let result = self.apply_latest(lb, triggering).await;
        lock.release_logged().await;
        result
    }

    /// Render and apply until the deployed version matches the configured
    /// one or the catch-up rounds run out. Caller holds the lock.
    async fn apply_latest(
        &self,
        lb_id: LoadBalancerId,
        triggering: Option<InstanceId>,
    ) -> Result<ReconfigureOutcome, ReconfigurationError> {
        let store = &self.platform.store;
        let max_rounds = self.platform.config.load_balancer.max_catch_up_rounds + 1;
        let mut rounds = 0;

        loop {
            let lb = store.load_balancer(lb_id).await?;
            let candidate = lb.configuration_version;

            let configuration = Aggregator::new(self.platform)
                .configuration(&lb, triggering)
                .await
                .context(AggregationSnafu { lb: lb_id })?;
            self.platform
                .applier
                .apply(&lb, &configuration)
                .await
                .context(ReconfigurationFailedSnafu { lb: lb_id })?;
            rounds += 1;

            let deployed = store
                .advance_deployed_configuration_version(lb_id, candidate)
                .await?;
            self.platform
                .events
                .emit(LifecycleEvent::LoadBalancerReconfigured {
                    load_balancer: lb_id,
                    version: deployed,
                });

            let latest = store.load_balancer(lb_id).await?.configuration_version;
            if latest <= candidate {
                return Ok(ReconfigureOutcome::Applied {
                    version: candidate,
                    rounds,
                });
            }
            if rounds >= max_rounds {
                tracing::warn!(
                    "load balancer {}: still behind (deployed {}, configured {}) after {} rounds, leaving it to the next sweep",
                    lb_id,
                    candidate,
                    latest,
                    rounds
                );
                return Ok(ReconfigureOutcome::Applied {
                    version: candidate,
                    rounds,
                });
            }
            tracing::debug!(
                "load balancer {}: version moved {} -> {} during apply, catching up",
                lb_id,
                candidate,
                latest
            );
        }
    }

    /// Reconfigure every load balancer whose deployed version lags behind.
    pub async fn reconfigure_dirty_load_balancers(
        &self,
    ) -> Result<Vec<(LoadBalancerId, Result<ReconfigureOutcome, ReconfigurationError>)>, ReconfigurationError>
    {
        let dirty: Vec<LoadBalancerId> = self
            .platform
            .store
            .load_balancers()
            .await?
            .into_iter()
            .filter(|lb| lb.is_dirty())
            .map(|lb| lb.id)
            .collect();

        if dirty.is_empty() {
            tracing::debug!("No dirty load balancers");
            return Ok(Vec::new());
        }
        tracing::info!("Reconfiguring {} dirty load balancer(s)", dirty.len());

        let results = join_all(dirty.iter().map(|&id| self.reconfigure(id, None, false))).await;
        for (id, result) in dirty.iter().zip(&results) {
            if let Err(e) = result {
                tracing::error!("load balancer {}: sweep failed: {}", id, e);
            }
        }
        Ok(dirty.into_iter().zip(results).collect())
    }

    /// Remove this platform's fragment from `lb`, waiting for any running
    /// reconfiguration to finish first.
    pub async fn deconfigure(&self, lb_id: LoadBalancerId) -> Result<(), ReconfigurationError> {
        let settings = &self.platform.config.load_balancer;
        let lock = ReconfigureLock::acquire(
            self.platform.locks.as_ref(),
            lb_id,
            settings.lock_timeout,
            settings.lock_poll_interval,
            settings.lock_wait,
        )
        .await
        .context(LockSnafu { lb: lb_id })?;

        let result = match self.platform.store.load_balancer(lb_id).await {
            Ok(lb) => self
                .platform
                .applier
                .remove(&lb)
                .await
                .context(ReconfigurationFailedSnafu { lb: lb_id }),
            Err(e) => Err(e.into()),
        };
        lock.release_logged().await;
        result
    }

    /// Deconfigure `lb`, then delete its record.
    pub async fn delete_load_balancer(
        &self,
        lb_id: LoadBalancerId,
    ) -> Result<(), ReconfigurationError> {
        self.deconfigure(lb_id).await?;
        self.platform.store.delete_load_balancer(lb_id).await?;
        tracing::info!("load balancer {}: deleted", lb_id);
        Ok(())
    }
}
