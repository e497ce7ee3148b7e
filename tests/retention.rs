// ABOUTME: Integration tests for the appserver retention plan and its executor.
// ABOUTME: Fallbacks and release candidates survive; expired appservers are terminated.

mod support;

use chrono::{DateTime, Duration, TimeZone, Utc};
use hangar::orchestration::{RetentionDecision, RetentionPlan, terminate_obsolete_appservers};
use hangar::resources::{AppServerStatus, ServerStatus};
use hangar::store::{AppServerStore, ServerStore};
use proptest::prelude::*;
use support::Harness;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn day(n: i64) -> DateTime<Utc> {
    t0() + Duration::days(n)
}

#[tokio::test]
async fn five_days_after_the_first_release() {
    let h = Harness::new();
    let instance = h.instance("shop", &[], None).await;
    let first = h.running_appserver(&instance, day(0)).await;
    let second = h.running_appserver(&instance, day(1)).await;
    let fallback = h.running_appserver(&instance, day(2)).await;
    let active = h.running_appserver(&instance, day(3)).await;
    h.force_active(&active, day(3)).await;

    let appservers = h.store.appservers_for_instance(instance.id).await.unwrap();
    let plan = RetentionPlan::compute(&appservers, 2, day(5));

    assert_eq!(plan.latest_activation, Some(day(3)));
    assert_eq!(plan.decision(first.id), Some(RetentionDecision::Terminate));
    assert_eq!(plan.decision(second.id), Some(RetentionDecision::Terminate));
    assert_eq!(plan.decision(fallback.id), Some(RetentionDecision::KeepFallback));
    assert_eq!(plan.decision(active.id), Some(RetentionDecision::KeepActive));
}

#[tokio::test]
async fn fallback_expires_with_the_activation() {
    let h = Harness::new();
    let instance = h.instance("shop", &[], None).await;
    let fallback = h.running_appserver(&instance, day(2)).await;
    let active = h.running_appserver(&instance, day(3)).await;
    h.force_active(&active, day(3)).await;

    let appservers = h.store.appservers_for_instance(instance.id).await.unwrap();

    // Exactly two days after the activation is still inside the window.
    let plan = RetentionPlan::compute(&appservers, 2, day(5));
    assert_eq!(plan.decision(fallback.id), Some(RetentionDecision::KeepFallback));

    let plan = RetentionPlan::compute(&appservers, 2, day(5) + Duration::seconds(1));
    assert_eq!(plan.decision(fallback.id), Some(RetentionDecision::Terminate));
}

#[tokio::test]
async fn release_candidate_is_kept_until_its_own_creation_expires() {
    let h = Harness::new();
    let instance = h.instance("shop", &[], None).await;
    let active = h.running_appserver(&instance, day(0)).await;
    h.force_active(&active, day(0)).await;
    let candidate = h.running_appserver(&instance, day(1)).await;
    let failed = h.failed_appserver(&instance, day(1)).await;

    let appservers = h.store.appservers_for_instance(instance.id).await.unwrap();
    let plan = RetentionPlan::compute(&appservers, 2, day(3));
    assert_eq!(
        plan.decision(candidate.id),
        Some(RetentionDecision::KeepReleaseCandidate)
    );
    assert_eq!(plan.decision(failed.id), Some(RetentionDecision::KeepRecent));

    let plan = RetentionPlan::compute(&appservers, 2, day(4));
    assert_eq!(plan.decision(candidate.id), Some(RetentionDecision::Terminate));
    assert_eq!(plan.decision(failed.id), Some(RetentionDecision::Terminate));
    assert_eq!(plan.decision(active.id), Some(RetentionDecision::KeepActive));
}

#[tokio::test]
async fn executor_terminates_what_the_plan_rejects() {
    let h = Harness::new();
    let instance = h.instance("shop", &[], None).await;
    let first = h.running_appserver(&instance, day(0)).await;
    let second = h.running_appserver(&instance, day(1)).await;
    let fallback = h.running_appserver(&instance, day(2)).await;
    let active = h.running_appserver(&instance, day(3)).await;
    h.force_active(&active, day(3)).await;

    let report = terminate_obsolete_appservers(&h.platform, instance.id, 2, day(5))
        .await
        .unwrap();

    assert_eq!(report.terminated, vec![first.id, second.id]);
    assert!(report.failed.is_empty());
    for app in [&first, &second] {
        let after = h.store.appserver(app.id).await.unwrap();
        assert_eq!(after.status, AppServerStatus::Terminated);
        assert_eq!(
            h.store.server(app.server_id).await.unwrap().status,
            ServerStatus::Terminated
        );
    }
    for app in [&fallback, &active] {
        assert_eq!(
            h.store.appserver(app.id).await.unwrap().status,
            AppServerStatus::Running
        );
    }
    assert_eq!(h.compute.deleted.lock().len(), 2);

    // Running it again finds nothing new to do.
    let again = terminate_obsolete_appservers(&h.platform, instance.id, 2, day(5))
        .await
        .unwrap();
    assert!(again.terminated.is_empty());
    assert_eq!(
        again.plan.decision(first.id),
        Some(RetentionDecision::AlreadyTerminated)
    );
}

#[tokio::test]
async fn executor_reports_failures_and_continues() {
    let h = Harness::new();
    let instance = h.instance("shop", &[], None).await;
    let first = h.running_appserver(&instance, day(0)).await;
    let second = h.running_appserver(&instance, day(0)).await;
    *h.compute.delete_outcome.lock() =
        Some(hangar::services::DeleteOutcome::Failed("quota API down".to_string()));

    let report = terminate_obsolete_appservers(&h.platform, instance.id, 2, day(10))
        .await
        .unwrap();

    assert!(report.terminated.is_empty());
    let failed: Vec<_> = report.failed.iter().map(|(id, _)| *id).collect();
    assert!(failed.contains(&first.id) || failed.contains(&second.id));
    assert_eq!(report.plan.to_terminate().count(), report.failed.len());
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn plan_never_terminates_active_or_unexpired_appservers(
        fleet in proptest::collection::vec((0i64..10, any::<bool>(), any::<bool>()), 1..8),
        days in 0u32..5,
        now_day in 0i64..14,
    ) {
        let appservers = runtime().block_on(async {
            let h = Harness::new();
            let instance = h.instance("prop", &[], None).await;
            for (created, running, active) in &fleet {
                let app = if *running {
                    h.running_appserver(&instance, day(*created)).await
                } else {
                    h.failed_appserver(&instance, day(*created)).await
                };
                if *active {
                    h.force_active(&app, day(*created)).await;
                }
            }
            h.store.appservers_for_instance(instance.id).await.unwrap()
        });

        let now = day(now_day);
        let plan = RetentionPlan::compute(&appservers, days, now);
        prop_assert_eq!(plan.entries.len(), appservers.len());

        for app in &appservers {
            let decision = plan.decision(app.id).unwrap();
            if app.is_active {
                prop_assert_eq!(decision, RetentionDecision::KeepActive);
            }
            if decision == RetentionDecision::Terminate {
                prop_assert!(now - app.created > Duration::days(i64::from(days)));
            }
        }
        let fallbacks = plan
            .entries
            .iter()
            .filter(|e| e.decision == RetentionDecision::KeepFallback)
            .count();
        prop_assert!(fallbacks <= 1);
    }
}
