//! Time-saved credit policy.
//!
//! Each successful step credits some number of seconds to a persistent
//! counter.  The amount is a policy decision kept behind [`StepCredit`];
//! [`FixedCredit`] is the default.

use crate::workflow::{CommandStep, ExecutionResult};

/// Default seconds credited per successful step.
pub const DEFAULT_SECONDS_PER_STEP: i64 = 10;

/// Decides how many seconds a successful step is worth.
pub trait StepCredit: Send + Sync {
    /// Seconds to credit for `step`, which produced `result`.  Only called
    /// for successful steps.  Zero or less credits nothing.
    fn credit(&self, step: &CommandStep, result: &ExecutionResult) -> i64;
}

/// Credits the same amount for every successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCredit(pub i64);

impl Default for FixedCredit {
    fn default() -> Self {
        Self(DEFAULT_SECONDS_PER_STEP)
    }
}

impl StepCredit for FixedCredit {
    fn credit(&self, _step: &CommandStep, _result: &ExecutionResult) -> i64 {
        self.0
    }
}
