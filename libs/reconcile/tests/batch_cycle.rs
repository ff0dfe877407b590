//! Integration tests for the ordered sync protocol and the trigger loop.
//!
//! Uses recording collaborators to verify:
//! 1. Remote calls and commits happen in protocol order
//! 2. A failed step aborts the rest of the cycle without committing
//! 3. Bursts of triggers collapse into one cycle
//! 4. Shutdown stops in-flight cycles and the loop

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use nrp_reconcile::{BatchReconciler, CycleReport, EndpointRecord, SyncError, SyncStep};
use nrp_types::{EndpointDelta, ServiceSyncSet};
use tokio::sync::watch;

fn full_sync_set() -> ServiceSyncSet {
    ServiceSyncSet::new(ids(&["svc-add"]), ids(&["svc-del"])).unwrap()
}

fn endpoint_records() -> Vec<EndpointRecord> {
    vec![
        record("svc-add", &[("10.0.0.1", "192.168.0.1")]),
        record("SVC-DEL", &[("10.0.0.2", "192.168.0.2")]),
    ]
}

fn added_delta() -> EndpointDelta {
    EndpointDelta::added(
        "svc-add".into(),
        [("10.0.0.1".to_string(), "192.168.0.1".to_string())].into(),
    )
}

fn removed_delta() -> EndpointDelta {
    EndpointDelta::removed(
        "svc-del".into(),
        [("10.0.0.2".to_string(), "192.168.0.2".to_string())].into(),
    )
}

fn reconciler(
    diff: Arc<RecordingDiffSource>,
    endpoints: Vec<EndpointRecord>,
    remote: ScriptedRemote,
) -> BatchReconciler {
    let (reconciler, _handle) =
        BatchReconciler::new(diff, Arc::new(endpoints), Arc::new(remote), scope());
    reconciler
}

#[tokio::test]
async fn test_full_cycle_runs_in_protocol_order() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::new(
        log.clone(),
        full_sync_set(),
        snapshot(&["192.168.0.1", "192.168.0.2"]),
    ));
    let reconciler = reconciler(diff, endpoint_records(), ScriptedRemote::ok(log.clone()));
    let (_tx, mut rx) = watch::channel(false);

    let report = reconciler.run_cycle(&mut rx).await.unwrap();

    assert_eq!(
        calls(&log),
        vec![
            Call::RemoteServices {
                added: names(&["svc-add"]),
                removed: vec![],
            },
            Call::CommitServices {
                added: names(&["svc-add"]),
                removed: vec![],
            },
            Call::CommitEndpoints(added_delta()),
            Call::CommitEndpoints(removed_delta()),
            Call::RemoteLocations {
                locations: names(&["192.168.0.1", "192.168.0.2"]),
            },
            Call::CommitLocations {
                locations: names(&["192.168.0.1", "192.168.0.2"]),
            },
            Call::RemoteServices {
                added: vec![],
                removed: names(&["svc-del"]),
            },
            Call::CommitServices {
                added: vec![],
                removed: names(&["svc-del"]),
            },
        ]
    );
    assert_eq!(
        report,
        CycleReport {
            services_added: 1,
            endpoint_deltas: 2,
            locations_synced: 2,
            services_removed: 1,
        }
    );
}

#[tokio::test]
async fn test_failed_add_aborts_whole_cycle() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::new(
        log.clone(),
        full_sync_set(),
        snapshot(&["192.168.0.1"]),
    ));
    let remote = ScriptedRemote::ok(log.clone()).with_services(vec![Err(SyncError::Rejected {
        status: 500,
        body: "boom".to_string(),
    })]);
    let reconciler = reconciler(diff, endpoint_records(), remote);
    let (_tx, mut rx) = watch::channel(false);

    let err = reconciler.run_cycle(&mut rx).await.unwrap_err();

    assert_eq!(err.step, SyncStep::AddServices);
    assert!(matches!(err.source, SyncError::Rejected { status: 500, .. }));
    assert_eq!(
        calls(&log),
        vec![Call::RemoteServices {
            added: names(&["svc-add"]),
            removed: vec![],
        }]
    );
}

#[tokio::test]
async fn test_failed_locations_skips_removal() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::new(
        log.clone(),
        full_sync_set(),
        snapshot(&["192.168.0.1"]),
    ));
    let remote = ScriptedRemote::ok(log.clone()).with_locations(vec![Err(SyncError::Transport {
        attempts: 3,
        message: "connection refused".to_string(),
    })]);
    let reconciler = reconciler(diff, endpoint_records(), remote);
    let (_tx, mut rx) = watch::channel(false);

    let err = reconciler.run_cycle(&mut rx).await.unwrap_err();
    assert_eq!(err.step, SyncStep::UpdateLocations);

    let log = calls(&log);
    assert!(!log.iter().any(|c| matches!(c, Call::CommitLocations { .. })));
    assert!(!log
        .iter()
        .any(|c| matches!(c, Call::RemoteServices { removed, .. } if !removed.is_empty())));
    // Earlier steps stay committed.
    assert!(log.contains(&Call::CommitEndpoints(added_delta())));
}

#[tokio::test]
async fn test_failed_removal_keeps_earlier_commits() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::new(
        log.clone(),
        full_sync_set(),
        snapshot(&["192.168.0.1"]),
    ));
    let remote = ScriptedRemote::ok(log.clone()).with_services(vec![
        Ok(()),
        Err(SyncError::Rejected {
            status: 404,
            body: String::new(),
        }),
    ]);
    let reconciler = reconciler(diff, endpoint_records(), remote);
    let (_tx, mut rx) = watch::channel(false);

    let err = reconciler.run_cycle(&mut rx).await.unwrap_err();
    assert_eq!(err.step, SyncStep::RemoveServices);

    let log = calls(&log);
    assert_eq!(
        log.last(),
        Some(&Call::RemoteServices {
            added: vec![],
            removed: names(&["svc-del"]),
        })
    );
    assert!(log.contains(&Call::CommitLocations {
        locations: names(&["192.168.0.1"]),
    }));
}

#[tokio::test]
async fn test_empty_endpoint_delta_is_not_committed() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::new(
        log.clone(),
        ServiceSyncSet::additions_only(ids(&["svc-add"])),
        Default::default(),
    ));
    let endpoints = vec![record("svc-other", &[("10.0.0.9", "192.168.0.9")])];
    let reconciler = reconciler(diff, endpoints, ScriptedRemote::ok(log.clone()));
    let (_tx, mut rx) = watch::channel(false);

    let report = reconciler.run_cycle(&mut rx).await.unwrap();

    assert_eq!(report.endpoint_deltas, 0);
    assert!(!calls(&log)
        .iter()
        .any(|c| matches!(c, Call::CommitEndpoints(_))));
}

#[tokio::test]
async fn test_nothing_pending_makes_no_calls() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::empty(log.clone()));
    let reconciler = reconciler(diff, endpoint_records(), ScriptedRemote::ok(log.clone()));
    let (_tx, mut rx) = watch::channel(false);

    let report = reconciler.run_cycle(&mut rx).await.unwrap();

    assert!(report.is_noop());
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn test_shutdown_during_remote_call_commits_nothing() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::new(
        log.clone(),
        full_sync_set(),
        snapshot(&["192.168.0.1"]),
    ));
    let (reconciler, _handle) = BatchReconciler::new(
        diff,
        Arc::new(endpoint_records()),
        Arc::new(HangingRemote),
        scope(),
    );
    let (tx, mut rx) = watch::channel(false);

    let task = tokio::spawn(async move { reconciler.run_cycle(&mut rx).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.send(true).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("cycle should stop on shutdown")
        .unwrap()
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.step, SyncStep::AddServices);
    assert!(calls(&log).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_trigger_burst_runs_one_cycle() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::empty(log.clone()));
    let (reconciler, handle) = BatchReconciler::new(
        diff.clone(),
        Arc::new(Vec::<EndpointRecord>::new()),
        Arc::new(ScriptedRemote::ok(log)),
        scope(),
    );
    let (tx, rx) = watch::channel(false);

    for _ in 0..5 {
        handle.trigger();
    }
    let task = tokio::spawn(reconciler.run(rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(diff.reads(), 1);

    assert!(handle.trigger());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(diff.reads(), 2);

    tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_failed_cycle() {
    let log = new_log();
    let diff = Arc::new(RecordingDiffSource::new(
        log.clone(),
        ServiceSyncSet::additions_only(ids(&["svc-add"])),
        Default::default(),
    ));
    let remote = ScriptedRemote::ok(log.clone()).with_services(vec![Err(SyncError::Rejected {
        status: 503,
        body: String::new(),
    })]);
    let (reconciler, handle) = BatchReconciler::new(
        diff.clone(),
        Arc::new(Vec::<EndpointRecord>::new()),
        Arc::new(remote),
        scope(),
    );
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(reconciler.run(rx));

    handle.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!calls(&log)
        .iter()
        .any(|c| matches!(c, Call::CommitServices { .. })));

    // Same pending work is retried verbatim and now succeeds.
    handle.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(diff.reads(), 2);
    assert!(calls(&log).contains(&Call::CommitServices {
        added: names(&["svc-add"]),
        removed: vec![],
    }));

    tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_loop_stops_when_handles_dropped() {
    let log = new_log();
    let (reconciler, handle) = BatchReconciler::new(
        Arc::new(RecordingDiffSource::empty(log.clone())),
        Arc::new(Vec::<EndpointRecord>::new()),
        Arc::new(ScriptedRemote::ok(log)),
        scope(),
    );
    let (_tx, rx) = watch::channel(false);
    let task = tokio::spawn(reconciler.run(rx));

    drop(handle);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("loop should stop")
        .unwrap();
}
