// Session and view tests against an in-process WebSocket endpoint

mod common;

use common::{spawn_endpoint, unused_base_url, wait_for_snapshot};
use edge_reader::config::StreamSettings;
use edge_reader::models::{ConnectionStatus, StreamKey};
use edge_reader::session::{TelemetrySession, TelemetryView};
use std::time::Duration;

fn key(equipment_id: u64, keys: &[&str], hz: f64) -> StreamKey {
    StreamKey::new(equipment_id, keys.iter().copied(), hz).unwrap()
}

#[tokio::test]
async fn session_applies_frames_and_reports_close() {
    let endpoint = spawn_endpoint(
        &[
            r#"{"timestamp":"2026-01-01T00:00:00Z","metrics":{"temperature":20.0}}"#,
            "not json",
            r#"{"pressure":5}"#,
        ],
        true,
    )
    .await;
    let mut session = TelemetrySession::spawn(
        key(7, &["temperature", "pressure"], 2.0),
        &endpoint.settings(50),
    );
    let mut rx = session.subscribe();

    let snapshot = wait_for_snapshot(&mut rx, |s| s.status == ConnectionStatus::Closed).await;
    assert_eq!(snapshot.frames_applied, 2);
    assert_eq!(snapshot.frames_dropped, 1);
    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.history[0].timestamp, "2026-01-01T00:00:00Z");
    assert_eq!(snapshot.latest.len(), 1);
    assert_eq!(snapshot.latest.get("pressure"), Some(&5.0));

    session.finished().await;
    let requests = endpoint.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![(7, Some("keys=temperature%2Cpressure&hz=2".to_string()))]
    );
}

#[tokio::test]
async fn session_history_is_bounded() {
    let frames: Vec<String> = (0..5).map(|i| format!(r#"{{"flow":{}}}"#, i)).collect();
    let refs: Vec<&str> = frames.iter().map(String::as_str).collect();
    let endpoint = spawn_endpoint(&refs, true).await;
    let session = TelemetrySession::spawn(key(1, &["flow"], 1.0), &endpoint.settings(3));
    let mut rx = session.subscribe();

    let snapshot = wait_for_snapshot(&mut rx, |s| s.status == ConnectionStatus::Closed).await;
    let flows: Vec<f64> = snapshot
        .history
        .iter()
        .filter_map(|f| f.get("flow"))
        .collect();
    assert_eq!(flows, vec![2.0, 3.0, 4.0]);
}

#[tokio::test]
async fn stop_closes_the_connection_and_is_idempotent() {
    let endpoint = spawn_endpoint(&[r#"{"temperature":21.5}"#], false).await;
    let mut session =
        TelemetrySession::spawn(key(3, &["temperature"], 2.0), &endpoint.settings(50));
    let mut rx = session.subscribe();
    wait_for_snapshot(&mut rx, |s| {
        s.status == ConnectionStatus::Open && s.frames_applied == 1
    })
    .await;

    session.stop();
    session.stop();
    assert!(session.is_stopped());
    tokio::time::timeout(Duration::from_secs(3), session.finished())
        .await
        .expect("session task did not finish after stop");

    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, ConnectionStatus::Closed);
    assert_eq!(snapshot.frames_applied, 1);
    assert_eq!(snapshot.latest.get("temperature"), Some(&21.5));
}

#[tokio::test]
async fn stop_discards_frames_still_in_flight() {
    let frames: Vec<String> = (0..2000).map(|i| format!(r#"{{"flow":{}}}"#, i)).collect();
    let refs: Vec<&str> = frames.iter().map(String::as_str).collect();
    let endpoint = spawn_endpoint(&refs, false).await;
    let mut session = TelemetrySession::spawn(key(4, &["flow"], 10.0), &endpoint.settings(240));
    let mut rx = session.subscribe();
    wait_for_snapshot(&mut rx, |s| s.frames_applied >= 1).await;

    let at_stop = session.snapshot().frames_applied;
    session.stop();
    tokio::time::timeout(Duration::from_secs(3), session.finished())
        .await
        .expect("session task did not finish after stop");

    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, ConnectionStatus::Closed);
    assert!(
        snapshot.frames_applied <= at_stop + 1,
        "applied {} frames after stop at {}",
        snapshot.frames_applied,
        at_stop
    );
}

#[tokio::test]
async fn connect_failure_ends_closed() {
    let settings = StreamSettings {
        api_base: unused_base_url().await,
        history_capacity: 50,
        connect_timeout: Duration::from_secs(2),
    };
    let session = TelemetrySession::spawn(key(9, &[], 2.0), &settings);
    let mut rx = session.subscribe();
    let snapshot = wait_for_snapshot(&mut rx, |s| s.status == ConnectionStatus::Closed).await;
    assert_eq!(snapshot.frames_applied, 0);
    assert!(snapshot.history.is_empty());
}

#[tokio::test]
async fn view_keeps_session_for_unchanged_key() {
    let endpoint = spawn_endpoint(&[], false).await;
    let mut view = TelemetryView::new(endpoint.settings(240));

    assert!(view.watch(key(5, &["temperature", "pressure"], 2.0)));
    let mut rx = view.session().unwrap().subscribe();
    wait_for_snapshot(&mut rx, |s| s.status == ConnectionStatus::Open).await;

    assert!(!view.watch(key(5, &["temperature", "pressure"], 2.0)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(endpoint.connection_count(), 1);
    view.close();
}

#[tokio::test]
async fn view_rekey_stops_old_session_and_starts_fresh() {
    let endpoint = spawn_endpoint(&[r#"{"metrics":{"temperature":30}}"#], false).await;
    let mut view = TelemetryView::new(endpoint.settings(240));

    view.watch(key(5, &["temperature"], 2.0));
    let mut old_rx = view.session().unwrap().subscribe();
    wait_for_snapshot(&mut old_rx, |s| s.frames_applied == 1).await;

    assert!(view.watch(key(5, &["temperature"], 4.0)));
    let old = wait_for_snapshot(&mut old_rx, |s| s.status == ConnectionStatus::Closed).await;
    assert_eq!(old.frames_applied, 1);

    let session = view.session().unwrap();
    assert_eq!(session.key().sample_rate_hz(), 4.0);
    let fresh = session.snapshot();
    assert!(fresh.history.len() <= 1);
    let mut new_rx = session.subscribe();
    let current = wait_for_snapshot(&mut new_rx, |s| s.frames_applied == 1).await;
    assert_eq!(current.history.len(), 1);
    assert_eq!(endpoint.connection_count(), 2);

    view.close();
    view.close();
    assert!(view.session().is_none());
}
