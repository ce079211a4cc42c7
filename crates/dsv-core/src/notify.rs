//! Change notifications for whoever is rendering the table
//!
//! The core publishes a [`ChangeEvent`] after every load, commit, undo,
//! redo and pipeline run. Delivery is fire-and-forget over `mpsc`
//! channels: publishing never blocks, and listeners that have hung up
//! are dropped on the next publish.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::mpsc::{self, Receiver, Sender};

/// What happened to the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    /// A new table was installed and history reset
    Loaded,
    /// An edit was committed
    Committed { label: String },
    /// The most recent edit was undone
    Undone { label: String },
    /// The most recently undone edit was redone
    Redone { label: String },
    /// A pipeline ran; `applied` rules succeeded, `failed_at` names the failing rule index
    Pipeline {
        applied: usize,
        failed_at: Option<usize>,
    },
}

/// Free-form key/value data passed through to listeners untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A "table changed" notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Optional identifier of what should be redrawn
    pub target: Option<String>,
    pub payload: Payload,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, target: Option<String>) -> Self {
        Self {
            kind,
            target,
            payload: Payload::default(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}

/// Broadcasts change events to any number of subscribers
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Vec<Sender<ChangeEvent>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener
    pub fn subscribe(&mut self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Number of listeners still connected as of the last publish
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send an event to every live subscriber
    pub fn publish(&mut self, event: ChangeEvent) {
        log::debug!("publishing {:?} to {} subscriber(s)", event.kind, self.subscribers.len());
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let mut notifier = Notifier::new();
        let a = notifier.subscribe();
        let b = notifier.subscribe();

        notifier.publish(ChangeEvent::new(ChangeKind::Loaded, Some("grid".to_string())));

        assert_eq!(a.try_recv().unwrap().target.as_deref(), Some("grid"));
        assert_eq!(b.try_recv().unwrap().kind, ChangeKind::Loaded);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut notifier = Notifier::new();
        let keep = notifier.subscribe();
        drop(notifier.subscribe());

        notifier.publish(ChangeEvent::new(ChangeKind::Loaded, None));
        assert_eq!(notifier.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn test_payload_is_passed_through() {
        let mut payload = Payload::new();
        payload.insert("rule", "uppercase").insert("count", 3);

        let event = ChangeEvent::new(
            ChangeKind::Committed {
                label: "edit".to_string(),
            },
            None,
        )
        .with_payload(payload.clone());

        assert_eq!(event.payload, payload);
        assert_eq!(event.payload.get("count").and_then(|v| v.as_u64()), Some(3));
    }
}
