//! Progress notification.
//!
//! The runner announces which step is active through a [`ProgressSink`]:
//! `notify(Some(step_id))` while a step runs or its post-step delay is in
//! progress, and `notify(None)` once the run is over.  Sinks are
//! fire-and-forget; they cannot fail and cannot slow the runner down.

use flowdeck_kernel::{ProgressBus, ProgressEvent};

/// One-way "active step" observer.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, step_id: Option<&str>);
}

/// Sink that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn notify(&self, _step_id: Option<&str>) {}
}

/// Any `Fn(Option<&str>)` closure is a sink.
impl<F> ProgressSink for F
where
    F: Fn(Option<&str>) + Send + Sync,
{
    fn notify(&self, step_id: Option<&str>) {
        self(step_id)
    }
}

/// Forwards notifications for one workflow onto a [`ProgressBus`].
#[derive(Clone)]
pub struct BusProgress {
    bus: ProgressBus,
    workflow_id: String,
}

impl BusProgress {
    pub fn new(bus: ProgressBus, workflow_id: impl Into<String>) -> Self {
        Self {
            bus,
            workflow_id: workflow_id.into(),
        }
    }
}

impl ProgressSink for BusProgress {
    fn notify(&self, step_id: Option<&str>) {
        self.bus.publish(ProgressEvent::step_active(
            self.workflow_id.clone(),
            step_id.map(String::from),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closure_sink_records_calls() {
        let seen = Mutex::new(Vec::new());
        let sink = |id: Option<&str>| seen.lock().unwrap().push(id.map(String::from));
        sink.notify(Some("a"));
        sink.notify(None);
        assert_eq!(*seen.lock().unwrap(), vec![Some("a".to_string()), None]);
    }

    #[tokio::test]
    async fn bus_sink_publishes_step_events() {
        let bus = ProgressBus::new(8);
        let mut rx = bus.subscribe();
        let sink = BusProgress::new(bus.clone(), "wf-1");

        sink.notify(Some("s1"));
        sink.notify(None);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.workflow_id(), "wf-1");
        assert!(matches!(
            first.as_ref(),
            ProgressEvent::StepActive { step_id: Some(id), .. } if id == "s1"
        ));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.as_ref(),
            ProgressEvent::StepActive { step_id: None, .. }
        ));
    }

    #[test]
    fn bus_sink_without_subscribers_is_silent() {
        let sink = BusProgress::new(ProgressBus::new(4), "wf");
        sink.notify(Some("s"));
    }
}
