// ABOUTME: Integration tests for versioned, lock-serialized load balancer reconfiguration.
// ABOUTME: Covers concurrency, lock contention, apply failures and the kill switch.

mod support;

use chrono::Utc;
use hangar::lb::{ReconfigurationErrorKind, ReconfigureLock, ReconfigureOutcome, Reconfigurator};
use hangar::store::{InstanceStore, LoadBalancerStore, StoreError};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use support::{Harness, RecordingApplier, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reconfigures_never_overlap() {
    let h = Arc::new(Harness::with(
        test_config(),
        RecordingApplier::with_delay(Duration::from_millis(20)),
        |b| b,
    ));
    let lb = h.load_balancer("lb1.example.com").await;
    let instance = h.instance("shop", &["shop.example.com"], Some(lb.id)).await;
    let app = h.running_appserver(&instance, Utc::now()).await;
    h.force_active(&app, Utc::now()).await;
    let initial = h.store.load_balancer(lb.id).await.unwrap().configuration_version;

    let (lb_id, instance_id) = (lb.id, instance.id);

    const N: u64 = 16;
    let mut handles = Vec::new();
    for _ in 0..N {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            Reconfigurator::new(&h.platform)
                .reconfigure(lb_id, Some(instance_id), true)
                .await
        }));
    }

    let mut applied_versions = Vec::new();
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ReconfigureOutcome::Applied { version, .. } => applied_versions.push(version),
            ReconfigureOutcome::Deferred => {}
            ReconfigureOutcome::Disabled => panic!("reconfiguration is enabled"),
        }
    }

    assert_eq!(h.applier.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(!applied_versions.is_empty());

    let after = h.store.load_balancer(lb.id).await.unwrap();
    assert_eq!(after.configuration_version, initial + N);
    assert_eq!(
        after.deployed_configuration_version,
        *applied_versions.iter().max().unwrap()
    );

    // A final sweep converges whatever the last deferred caller left behind.
    Reconfigurator::new(&h.platform)
        .reconfigure(lb.id, None, false)
        .await
        .unwrap();
    let converged = h.store.load_balancer(lb.id).await.unwrap();
    assert!(!converged.is_dirty());
    assert_eq!(converged.deployed_configuration_version, initial + N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_not_lost_beside_other_writers() {
    let h = Arc::new(Harness::new());
    let lb = h.load_balancer("lb1.example.com").await;
    let instance = h.instance("shop", &[], Some(lb.id)).await;
    let initial = h.store.load_balancer(lb.id).await.unwrap().configuration_version;
    let (lb_id, instance_id) = (lb.id, instance.id);

    let mut handles = Vec::new();
    for i in 0..32u32 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                h.store.increment_configuration_version(lb_id).await.map(|_| ())
            } else {
                h.store.add_tag(instance_id, &format!("tag-{i}")).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let after = h.store.load_balancer(lb.id).await.unwrap();
    assert_eq!(after.configuration_version, initial + 16);
    assert_eq!(h.store.instance(instance.id).await.unwrap().tags.len(), 16);
}

#[tokio::test]
async fn contended_lock_defers_without_applying() {
    let h = Harness::new();
    let lb = h.load_balancer("lb1.example.com").await;
    let before = h.store.load_balancer(lb.id).await.unwrap();

    let held = ReconfigureLock::try_acquire(
        h.platform.locks.as_ref(),
        lb.id,
        Duration::from_secs(30),
    )
    .await
    .unwrap()
    .expect("lock is free");

    let outcome = Reconfigurator::new(&h.platform)
        .reconfigure(lb.id, None, true)
        .await
        .unwrap();
    assert_eq!(outcome, ReconfigureOutcome::Deferred);
    assert_eq!(h.applier.apply_count(), 0);

    let after = h.store.load_balancer(lb.id).await.unwrap();
    assert_eq!(after.configuration_version, before.configuration_version + 1);
    assert!(after.is_dirty());

    held.release().await.unwrap();
    let outcome = Reconfigurator::new(&h.platform)
        .reconfigure(lb.id, None, false)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconfigureOutcome::Applied { rounds: 1, .. }));
}

#[tokio::test]
async fn failed_apply_keeps_load_balancer_dirty_and_releases_lock() {
    let h = Harness::new();
    let lb = h.load_balancer("lb1.example.com").await;
    h.applier.fail.store(true, Ordering::SeqCst);

    let err = Reconfigurator::new(&h.platform)
        .reconfigure(lb.id, None, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ReconfigurationErrorKind::ApplyFailed);
    assert!(h.store.load_balancer(lb.id).await.unwrap().is_dirty());

    h.applier.fail.store(false, Ordering::SeqCst);
    let outcome = Reconfigurator::new(&h.platform)
        .reconfigure(lb.id, None, false)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconfigureOutcome::Applied { .. }));
    assert!(!h.store.load_balancer(lb.id).await.unwrap().is_dirty());
}

#[tokio::test]
async fn kill_switch_bumps_version_without_applying() {
    let mut config = test_config();
    config.load_balancer.disable_reconfiguration = true;
    let h = Harness::with_config(config);
    let lb = h.load_balancer("lb1.example.com").await;
    let before = h.store.load_balancer(lb.id).await.unwrap();

    let outcome = Reconfigurator::new(&h.platform)
        .reconfigure(lb.id, None, true)
        .await
        .unwrap();
    assert_eq!(outcome, ReconfigureOutcome::Disabled);
    assert_eq!(h.applier.apply_count(), 0);
    assert_eq!(
        h.store.load_balancer(lb.id).await.unwrap().configuration_version,
        before.configuration_version + 1
    );
}

#[tokio::test]
async fn sweep_reconfigures_only_dirty_load_balancers() {
    let h = Harness::new();
    let clean = h.load_balancer("lb1.example.com").await;
    let dirty = h.load_balancer("lb2.example.com").await;
    Reconfigurator::new(&h.platform)
        .reconfigure(clean.id, None, false)
        .await
        .unwrap();
    h.store.increment_configuration_version(dirty.id).await.unwrap();
    let applies_before = h.applier.apply_count();

    let results = Reconfigurator::new(&h.platform)
        .reconfigure_dirty_load_balancers()
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, dirty.id);
    assert!(results[0].1.is_ok());
    assert_eq!(h.applier.apply_count(), applies_before + 1);
    assert!(!h.store.load_balancer(dirty.id).await.unwrap().is_dirty());
}

#[tokio::test]
async fn delete_removes_fragment_then_record() {
    let h = Harness::new();
    let lb = h.load_balancer("lb1.example.com").await;

    Reconfigurator::new(&h.platform)
        .delete_load_balancer(lb.id)
        .await
        .unwrap();

    assert_eq!(*h.applier.removed.lock(), vec![lb.id]);
    assert!(matches!(
        h.store.load_balancer(lb.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn deconfigure_waits_for_a_running_reconfiguration() {
    let h = Harness::new();
    let lb = h.load_balancer("lb1.example.com").await;
    let held = ReconfigureLock::try_acquire(
        h.platform.locks.as_ref(),
        lb.id,
        Duration::from_secs(30),
    )
    .await
    .unwrap()
    .expect("lock is free");

    let reconfigurator = Reconfigurator::new(&h.platform);
    let deconfigure = reconfigurator.deconfigure(lb.id);
    let release = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(h.applier.removed.lock().is_empty());
        held.release().await.unwrap();
    };
    let (result, ()) = tokio::join!(deconfigure, release);

    result.unwrap();
    assert_eq!(*h.applier.removed.lock(), vec![lb.id]);
}
