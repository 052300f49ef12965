//! Post-step delays.
//!
//! A step may ask for a pause before the next step starts.  While the pause
//! runs, the progress signal stays on the step that is finishing and only
//! moves to the next step once the pause is over.
//!
//! All waiting goes through a [`Sleeper`] so tests can substitute a virtual
//! clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::progress::ProgressSink;
use crate::workflow::CommandStep;

/// Suspends the caller for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping via [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Enforces each step's `delay_after_seconds` between steps.
#[derive(Clone)]
pub struct DelayController {
    sleeper: Arc<dyn Sleeper>,
}

impl Default for DelayController {
    fn default() -> Self {
        Self::new(Arc::new(TokioSleeper))
    }
}

impl DelayController {
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    /// Wait out `previous`'s delay, if any, before `next` starts.
    ///
    /// Re-asserts `previous` as active for the duration of the pause, then
    /// announces `next`.  Returns the time waited, or `None` when `previous`
    /// has no delay (in which case the sink is not touched).
    pub async fn pause_between(
        &self,
        previous: &CommandStep,
        next: &CommandStep,
        progress: Option<&dyn ProgressSink>,
    ) -> Option<Duration> {
        let delay = previous.delay_after()?;

        if let Some(sink) = progress {
            sink.notify(Some(&previous.id));
        }
        debug!(
            after = %previous.id,
            before = %next.id,
            delay_ms = delay.as_millis() as u64,
            "delaying before next step"
        );
        self.sleeper.sleep(delay).await;
        if let Some(sink) = progress {
            sink.notify(Some(&next.id));
        }

        Some(delay)
    }
}
