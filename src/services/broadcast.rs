//! Fan-out of live events to connected sockets.
//!
//! Two independent channels exist: `metrics` (new samples, read by dashboard
//! clients) and `manager` (control updates, read by worker managers). Sends
//! never block; a subscriber that falls more than the channel capacity
//! behind loses the oldest events and is told how many it missed.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

pub const CHANNEL_CAPACITY: usize = 1024;

/// Socket envelope: `{"event": name, "data": payload}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Metrics,
    Manager,
}

#[derive(Clone)]
pub struct Broadcasts {
    metrics: broadcast::Sender<Event>,
    manager: broadcast::Sender<Event>,
}

impl Broadcasts {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (metrics, _) = broadcast::channel(capacity);
        let (manager, _) = broadcast::channel(capacity);
        Self { metrics, manager }
    }

    #[must_use]
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<Event> {
        self.sender(channel).subscribe()
    }

    /// Announce a new sample as `metric-{worker}-{metric}`. Returns the number
    /// of subscribers reached.
    pub fn publish_metric(&self, worker: &str, metric: &str, value: f64, units: Option<&str>) -> usize {
        let event = Event {
            event: metric_event_name(worker, metric),
            data: serde_json::json!({ "value": value, "units": units }),
        };
        self.publish(Channel::Metrics, event)
    }

    /// Ask the manager of `worker` to apply a control value.
    pub fn publish_control_update(&self, worker: &str, control_key: &str, control_value: serde_json::Value) -> usize {
        let event = Event {
            event: control_event_name(worker),
            data: serde_json::json!({ "controlKey": control_key, "controlValue": control_value }),
        };
        self.publish(Channel::Manager, event)
    }

    fn publish(&self, channel: Channel, event: Event) -> usize {
        let name = event.event.clone();
        // Err only means nobody is listening right now.
        let reached = self.sender(channel).send(event).unwrap_or(0);
        trace!(?channel, event = %name, reached, "published event");
        reached
    }

    fn sender(&self, channel: Channel) -> &broadcast::Sender<Event> {
        match channel {
            Channel::Metrics => &self.metrics,
            Channel::Manager => &self.manager,
        }
    }
}

impl Default for Broadcasts {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

#[must_use]
pub fn metric_event_name(worker: &str, metric: &str) -> String {
    format!("metric-{worker}-{metric}")
}

#[must_use]
pub fn control_event_name(worker: &str) -> String {
    format!("control-update-{worker}")
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
