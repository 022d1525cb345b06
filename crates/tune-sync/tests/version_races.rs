mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{drain_events, metadata, options, set, settle, wait_event, MockGateway};
use tune_sync::{SyncEvent, SyncInput, SyncOptions, SyncSession, VersionPolicy};

async fn loaded_session(gateway: &Arc<MockGateway>, options: SyncOptions) -> SyncSession {
    let mut session = SyncSession::start(gateway.clone(), options, None);
    settle(session.handle_mut(), |status| status.displayed_version == Some(3)).await;
    drain_events(session.handle_mut());
    session
}

#[tokio::test(start_paused = true)]
async fn push_adopted_after_commit_wins() {
    let gateway = MockGateway::new(metadata(&[("a", 5.0)]), 3);
    let mut session = loaded_session(&gateway, options()).await;
    gateway.script_versions([6]);
    gateway.set_artifact_delay_for(6, Duration::from_secs(2));

    // Commit adopts 6 at +0.5s; its artifact arrives at +2.5s.
    session.handle().edit("a", 10.0);
    tokio::time::sleep(Duration::from_secs(1)).await;
    // Push adopts 7 at +1s; its artifact arrives immediately.
    session.handle().send(SyncInput::Push { version: 7 });

    wait_event(session.handle_mut(), |event| {
        *event == SyncEvent::ArtifactDiscarded { version: 6, current: 7 }
    })
    .await;
    let status = settle(session.handle_mut(), |_| true).await;
    assert_eq!(status.current_version, 7);
    assert_eq!(status.displayed_version, Some(7));
    assert_eq!(status.snapshot, set(&[("a", 10.0)]));
    let artifact = session.handle().artifact().expect("artifact");
    assert_eq!(artifact.bytes(), b"artifact-v7");
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn commit_adopted_after_push_wins() {
    let gateway = MockGateway::new(metadata(&[("a", 5.0)]), 3);
    let mut session = loaded_session(&gateway, options()).await;
    gateway.script_versions([6]);
    gateway.set_version_delay(Duration::from_secs(1));
    gateway.set_artifact_delay_for(7, Duration::from_secs(2));

    // Commit starts at +0.5s and adopts 6 at +1.5s.
    session.handle().edit("a", 10.0);
    tokio::time::sleep(Duration::from_secs(1)).await;
    // Push adopts 7 at +1s; its artifact arrives at +3s.
    session.handle().send(SyncInput::Push { version: 7 });

    wait_event(session.handle_mut(), |event| {
        *event == SyncEvent::ArtifactDiscarded { version: 7, current: 6 }
    })
    .await;
    let status = session.handle().status();
    assert_eq!(status.current_version, 6);
    assert_eq!(status.displayed_version, Some(6));
    assert_eq!(status.snapshot, set(&[("a", 10.0)]));
    let artifact = session.handle().artifact().expect("artifact");
    assert_eq!(artifact.bytes(), b"artifact-v6");
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn highest_policy_ignores_older_commit_version() {
    let gateway = MockGateway::new(metadata(&[("a", 5.0)]), 3);
    let options = SyncOptions {
        version_policy: VersionPolicy::Highest,
        ..options()
    };
    let mut session = loaded_session(&gateway, options).await;
    gateway.script_versions([6]);
    gateway.set_version_delay(Duration::from_secs(1));
    gateway.set_artifact_delay_for(7, Duration::from_secs(2));

    session.handle().edit("a", 10.0);
    tokio::time::sleep(Duration::from_secs(1)).await;
    session.handle().send(SyncInput::Push { version: 7 });

    wait_event(session.handle_mut(), |event| {
        *event == SyncEvent::ArtifactDisplayed { version: 7 }
    })
    .await;
    let status = settle(session.handle_mut(), |_| true).await;
    assert_eq!(status.current_version, 7);
    assert_eq!(status.displayed_version, Some(7));
    assert_eq!(status.snapshot, set(&[("a", 10.0)]));
    assert!(!gateway.artifact_fetches().contains(&6));
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn commit_snapshot_survives_concurrent_push() {
    let gateway = MockGateway::new(metadata(&[("a", 5.0)]), 3);
    let mut session = loaded_session(&gateway, options()).await;
    gateway.set_write_delay(Duration::from_secs(1));

    session.handle().edit("a", 10.0);
    tokio::time::sleep(Duration::from_millis(700)).await;
    // Another client changes `a` while our write is in flight.
    gateway.set_remote_value("a", 42.0);
    session.handle().send(SyncInput::Push { version: 4 });

    let events_seen = wait_event(session.handle_mut(), |event| {
        matches!(event, SyncEvent::Committed { .. })
    })
    .await;
    assert!(matches!(events_seen, SyncEvent::Committed { .. }));
    let status = settle(session.handle_mut(), |_| true).await;
    assert_eq!(status.snapshot, set(&[("a", 10.0)]));
    assert_eq!(status.values.get("a"), Some(10.0));
    assert_eq!(gateway.remote_value("a"), Some(10.0));
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn push_without_local_edits_refreshes_values() {
    let gateway = MockGateway::new(metadata(&[("a", 5.0)]), 3);
    let mut session = loaded_session(&gateway, options()).await;

    gateway.set_remote_value("a", 50.0);
    session.handle().send(SyncInput::Push { version: 4 });
    let status = settle(session.handle_mut(), |status| {
        status.displayed_version == Some(4)
    })
    .await;
    assert_eq!(status.values.get("a"), Some(50.0));
    assert_eq!(status.snapshot, set(&[("a", 50.0)]));
    assert_eq!(gateway.metadata_fetches(), 2);

    // The refreshed value is not echoed back.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(gateway.writes().is_empty());
    let events = drain_events(session.handle_mut());
    assert!(events.contains(&SyncEvent::PushReceived { version: 4 }));
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn widened_bounds_commit_previously_blocked_edit() {
    let gateway = MockGateway::new(metadata(&[("a", 5.0)]), 3);
    let mut session = loaded_session(&gateway, options()).await;

    session.handle().edit("a", 150.0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(gateway.writes().is_empty());
    assert_eq!(session.handle().status().validation.len(), 1);

    // The backend now accepts 150; the refresh must commit the held value.
    gateway.set_remote_bounds("a", Some(0.0), Some(200.0));
    session.handle().send(SyncInput::Push { version: 4 });
    let status = settle(session.handle_mut(), |status| {
        status.snapshot == set(&[("a", 150.0)])
    })
    .await;
    assert!(status.validation.is_empty());
    assert_eq!(status.values.get("a"), Some(150.0));
    assert_eq!(gateway.writes(), [("a".to_string(), 150.0)]);
    assert_eq!(status.displayed_version, Some(5));
    session.teardown().await;
}
