// ABOUTME: Retention policy for old appservers of an instance.
// ABOUTME: A pure plan decides what to keep; the executor terminates the rest.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::fsm::ResourceState;
use crate::lifecycle;
use crate::platform::Platform;
use crate::resources::{AppServer, AppServerStatus};
use crate::types::{AppServerId, InstanceId};

use super::error::OrchestrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionDecision {
    KeepActive,
    /// Newest running appserver from before the latest activation, kept
    /// while that activation is recent enough to revert.
    KeepFallback,
    /// Newest running appserver created after the latest activation.
    KeepReleaseCandidate,
    /// Not old enough to be terminated.
    KeepRecent,
    Terminate,
    AlreadyTerminated,
}

impl RetentionDecision {
    pub fn label(self) -> &'static str {
        match self {
            RetentionDecision::KeepActive => "keep (active)",
            RetentionDecision::KeepFallback => "keep (fallback)",
            RetentionDecision::KeepReleaseCandidate => "keep (release candidate)",
            RetentionDecision::KeepRecent => "keep (recent)",
            RetentionDecision::Terminate => "terminate",
            RetentionDecision::AlreadyTerminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionEntry {
    pub appserver: AppServerId,
    pub name: String,
    pub status: &'static str,
    pub created: DateTime<Utc>,
    pub decision: RetentionDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    pub days: u32,
    pub now: DateTime<Utc>,
    /// Latest activation among the active appservers.
    pub latest_activation: Option<DateTime<Utc>>,
    /// One entry per appserver, in input order.
    pub entries: Vec<RetentionEntry>,
}

impl RetentionPlan {
    /// Decide the fate of every appserver of one instance.
    ///
    /// A timestamp has expired once strictly more than `days` days passed
    /// between it and `now`. Active appservers are always kept. The
    /// fallback is kept until the latest activation expires, the release
    /// candidate until its own creation expires, and every other
    /// appserver until its creation expires.
    pub fn compute(appservers: &[AppServer], days: u32, now: DateTime<Utc>) -> Self {
        let window = Duration::days(i64::from(days));
        let expired = |ts: DateTime<Utc>| now - ts > window;

        let live = |a: &&AppServer| !a.is_terminated();
        let latest_activation = appservers
            .iter()
            .filter(live)
            .filter(|a| a.is_active)
            .filter_map(|a| a.last_activated)
            .max();

        let candidates = || {
            appservers
                .iter()
                .filter(live)
                .filter(|a| !a.is_active && a.status == AppServerStatus::Running)
        };
        let fallback = latest_activation.and_then(|activated| {
            candidates()
                .filter(|a| a.created < activated)
                .max_by_key(|a| (a.created, a.id.get()))
                .map(|a| a.id)
        });
        let release_candidate = candidates()
            .filter(|a| latest_activation.is_none_or(|activated| a.created > activated))
            .max_by_key(|a| (a.created, a.id.get()))
            .map(|a| a.id);

        let entries = appservers
            .iter()
            .map(|a| {
                let decision = if a.is_terminated() {
                    RetentionDecision::AlreadyTerminated
                } else if a.is_active {
                    RetentionDecision::KeepActive
                } else if Some(a.id) == fallback
                    && latest_activation.is_some_and(|activated| !expired(activated))
                {
                    RetentionDecision::KeepFallback
                } else if Some(a.id) == release_candidate && !expired(a.created) {
                    RetentionDecision::KeepReleaseCandidate
                } else if expired(a.created) {
                    RetentionDecision::Terminate
                } else {
                    RetentionDecision::KeepRecent
                };
                RetentionEntry {
                    appserver: a.id,
                    name: a.name.clone(),
                    status: a.status.state_id(),
                    created: a.created,
                    decision,
                }
            })
            .collect();

        Self {
            days,
            now,
            latest_activation,
            entries,
        }
    }

    pub fn decision(&self, id: AppServerId) -> Option<RetentionDecision> {
        self.entries
            .iter()
            .find(|e| e.appserver == id)
            .map(|e| e.decision)
    }

    pub fn to_terminate(&self) -> impl Iterator<Item = AppServerId> + '_ {
        self.entries
            .iter()
            .filter(|e| e.decision == RetentionDecision::Terminate)
            .map(|e| e.appserver)
    }
}

/// What the executor did with a plan.
#[derive(Debug)]
pub struct RetentionReport {
    pub plan: RetentionPlan,
    pub terminated: Vec<AppServerId>,
    pub failed: Vec<(AppServerId, String)>,
}

/// Terminate every appserver of `instance_id` the retention plan rejects.
/// A failed termination is reported and does not stop the others.
pub async fn terminate_obsolete_appservers(
    platform: &Platform,
    instance_id: InstanceId,
    days: u32,
    now: DateTime<Utc>,
) -> Result<RetentionReport, OrchestrationError> {
    let appservers = platform.store.appservers_for_instance(instance_id).await?;
    let plan = RetentionPlan::compute(&appservers, days, now);

    let mut terminated = Vec::new();
    let mut failed = Vec::new();
    for id in plan.to_terminate() {
        match lifecycle::terminate_vm(platform, id).await {
            Ok(()) => terminated.push(id),
            Err(e) => {
                tracing::error!("appserver {}: retention termination failed: {}", id, e);
                failed.push((id, e.to_string()));
            }
        }
    }

    tracing::info!(
        "instance {}: retention terminated {} appserver(s), {} failure(s)",
        instance_id,
        terminated.len(),
        failed.len()
    );
    Ok(RetentionReport {
        plan,
        terminated,
        failed,
    })
}
