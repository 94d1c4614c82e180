use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::*;

#[test]
fn event_names() {
    assert_eq!(metric_event_name("greenhouse", "temperature"), "metric-greenhouse-temperature");
    assert_eq!(control_event_name("greenhouse"), "control-update-greenhouse");
}

#[test]
fn publish_without_subscribers_reaches_nobody() {
    let broadcasts = Broadcasts::default();
    assert_eq!(broadcasts.publish_metric("w", "m", 1.0, None), 0);
}

#[tokio::test]
async fn metric_event_carries_value_and_units() {
    let broadcasts = Broadcasts::default();
    let mut rx = broadcasts.subscribe(Channel::Metrics);

    assert_eq!(broadcasts.publish_metric("greenhouse", "temperature", 21.5, Some("C")), 1);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event, "metric-greenhouse-temperature");
    assert_eq!(event.data, serde_json::json!({ "value": 21.5, "units": "C" }));
}

#[tokio::test]
async fn control_update_goes_to_manager_channel_only() {
    let broadcasts = Broadcasts::default();
    let mut metrics = broadcasts.subscribe(Channel::Metrics);
    let mut manager = broadcasts.subscribe(Channel::Manager);

    broadcasts.publish_control_update("greenhouse", "pump", serde_json::json!(true));

    let event = manager.recv().await.unwrap();
    assert_eq!(event.event, "control-update-greenhouse");
    assert_eq!(event.data, serde_json::json!({ "controlKey": "pump", "controlValue": true }));
    assert!(matches!(metrics.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn lagging_subscriber_drops_oldest_events() {
    let broadcasts = Broadcasts::new(2);
    let mut rx = broadcasts.subscribe(Channel::Metrics);

    for i in 0..5 {
        broadcasts.publish_metric("w", "m", f64::from(i), None);
    }

    assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
    assert_eq!(rx.recv().await.unwrap().data["value"], 3.0);
    assert_eq!(rx.recv().await.unwrap().data["value"], 4.0);
}

#[test]
fn event_serializes_as_envelope() {
    let event = Event { event: "metric-w-m".into(), data: serde_json::json!({ "value": 1.0, "units": null }) };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json, serde_json::json!({ "event": "metric-w-m", "data": { "value": 1.0, "units": null } }));
}
