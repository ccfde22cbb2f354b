//! Integration tests driving a full command sequence against a mock
//! orchestrator and asserting the store's mirror stays consistent.

use std::sync::Arc;
use tradewind_core::session::SessionStore;
use tradewind_orchestrator::ControlClient;

fn state_json(is_live: bool, winding_down: bool, throttle: f64, ts: &str) -> String {
    let wind_down_started_at =
        if winding_down { format!("\"{ts}\"") } else { "null".to_string() };
    format!(
        r#"{{
            "data": {{
                "is_live": {is_live},
                "is_winding_down": {winding_down},
                "wind_down_started_at": {wind_down_started_at},
                "emergency_halt_active": false,
                "emergency_halt_reason": null,
                "risk_throttle": {throttle},
                "last_updated": "{ts}"
            }},
            "success": true,
            "request_id": "r-1"
        }}"#
    )
}

#[tokio::test]
async fn test_session_lifecycle_updates_the_mirror_in_order() {
    let mut server = mockito::Server::new_async().await;

    let get_mock = server
        .mock("GET", "/state")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(state_json(false, false, 1.0, "2026-08-06T09:00:00Z"))
        .create();
    let engage_mock = server
        .mock("POST", "/engage")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(state_json(true, false, 1.0, "2026-08-06T09:00:01Z"))
        .create();
    let throttle_mock = server
        .mock("POST", "/risk-throttle")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(state_json(true, false, 0.25, "2026-08-06T09:00:02Z"))
        .create();
    let wind_down_mock = server
        .mock("POST", "/wind-down")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(state_json(true, true, 0.25, "2026-08-06T09:00:03Z"))
        .create();

    let store = Arc::new(SessionStore::new());
    let client = ControlClient::new(server.url(), Arc::clone(&store));

    let initial = client.get_state().await.unwrap();
    assert!(!initial.is_live);

    let engaged = client.engage().await.unwrap();
    assert!(engaged.is_live);

    let throttled = client.set_risk_throttle(0.25).await.unwrap();
    assert_eq!(throttled.risk_throttle, 0.25);

    let winding = client.wind_down(300).await.unwrap();
    assert!(winding.is_winding_down);
    assert!(winding.wind_down_started_at.is_some());

    let snapshot = store.snapshot();
    let held = snapshot.orchestrator.unwrap();
    assert!(held.is_winding_down);
    assert_eq!(held.risk_throttle, 0.25);
    assert!(snapshot.diagnostics.is_empty());

    get_mock.assert();
    engage_mock.assert();
    throttle_mock.assert();
    wind_down_mock.assert();
}

#[tokio::test]
async fn test_stale_poll_cannot_roll_back_a_command() {
    let mut server = mockito::Server::new_async().await;

    // A poll whose response was produced before the throttle command
    // lands after it.
    let throttle_mock = server
        .mock("POST", "/risk-throttle")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(state_json(true, false, 0.1, "2026-08-06T09:00:05Z"))
        .create();
    let stale_get_mock = server
        .mock("GET", "/state")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(state_json(true, false, 1.0, "2026-08-06T09:00:04Z"))
        .create();

    let store = Arc::new(SessionStore::new());
    let client = ControlClient::new(server.url(), Arc::clone(&store));

    let throttled = client.set_risk_throttle(0.1).await.unwrap();
    assert_eq!(throttled.risk_throttle, 0.1);

    let returned = client.get_state().await.unwrap();
    // The stale read returns the held state, not the older server snapshot.
    assert_eq!(returned.risk_throttle, 0.1);

    let held = store.snapshot().orchestrator.unwrap();
    assert_eq!(held.risk_throttle, 0.1);

    throttle_mock.assert();
    stale_get_mock.assert();
}
