//! Progress bus.
//!
//! The engine announces which step is active through a single-method sink.
//! [`ProgressBus`] is the transport behind that sink when more than one
//! surface needs to follow along: a window highlighting the active card, a
//! tray icon, a terminal printer.  It is a thin publish/subscribe layer over
//! [`tokio::sync::broadcast`].
//!
//! Events are wrapped in [`Arc`] so broadcasting to several subscribers does
//! not clone the payload.  Publishing with no subscribers is a no-op.
//!
//! # Usage
//!
//! ```rust,no_run
//! # use flowdeck_kernel::ipc::{ProgressBus, ProgressEvent};
//! # async fn example() {
//! let bus = ProgressBus::new(64);
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ProgressEvent::step_active("wf-1", Some("step-a".into())));
//!
//! let event = rx.recv().await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// An event that flows through the progress bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The active step changed.  `step_id == None` clears the highlight.
    StepActive {
        workflow_id: String,
        step_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A run finished (successfully or not).
    RunCompleted {
        workflow_id: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    /// Build a [`ProgressEvent::StepActive`] stamped with the current time.
    pub fn step_active(workflow_id: impl Into<String>, step_id: Option<String>) -> Self {
        Self::StepActive {
            workflow_id: workflow_id.into(),
            step_id,
            timestamp: Utc::now(),
        }
    }

    /// Build a [`ProgressEvent::RunCompleted`] stamped with the current time.
    pub fn run_completed(workflow_id: impl Into<String>, success: bool) -> Self {
        Self::RunCompleted {
            workflow_id: workflow_id.into(),
            success,
            timestamp: Utc::now(),
        }
    }

    /// The workflow this event belongs to.
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::StepActive { workflow_id, .. } | Self::RunCompleted { workflow_id, .. } => {
                workflow_id
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Publish/subscribe progress bus backed by [`tokio::sync::broadcast`].
///
/// Cheaply cloneable (`Arc`-backed) and `Send + Sync`.
#[derive(Clone)]
pub struct ProgressBus {
    inner: Arc<ProgressBusInner>,
}

struct ProgressBusInner {
    sender: broadcast::Sender<Arc<ProgressEvent>>,
}

impl ProgressBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// A subscriber that falls more than `capacity` events behind receives
    /// [`broadcast::error::RecvError::Lagged`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(ProgressBusInner { sender }),
        }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of receivers that will observe it.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        match self.inner.sender.send(Arc::new(event)) {
            Ok(n) => {
                tracing::trace!(receivers = n, "progress event published");
                n
            }
            Err(_) => {
                tracing::trace!("progress event dropped, no subscribers");
                0
            }
        }
    }

    /// Create a new subscriber.  Earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.inner.sender.subscribe()
    }

    /// Return the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = ProgressBus::new(16);
        let mut rx = bus.subscribe();

        let receivers = bus.publish(ProgressEvent::step_active("wf", Some("s1".into())));
        assert_eq!(receivers, 1);

        let received = rx.recv().await.expect("should receive event");
        match received.as_ref() {
            ProgressEvent::StepActive {
                workflow_id,
                step_id,
                ..
            } => {
                assert_eq!(workflow_id, "wf");
                assert_eq!(step_id.as_deref(), Some("s1"));
            }
            other => panic!("unexpected event variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_share_payload() {
        let bus = ProgressBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(ProgressEvent::run_completed("wf", true));

        let e1 = rx1.recv().await.expect("rx1");
        let e2 = rx2.recv().await.expect("rx2");
        assert!(Arc::ptr_eq(&e1, &e2));
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = ProgressBus::new(16);
        assert_eq!(bus.publish(ProgressEvent::step_active("wf", None)), 0);
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let bus = ProgressBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ProgressEvent::step_active("wf", None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_active");
        assert!(json["step_id"].is_null());
        assert_eq!(event.workflow_id(), "wf");
    }
}
