//! Run-level verdicts.

use crate::workflow::ExecutionResult;

/// `true` iff every result succeeded.  An empty list is vacuously `true`;
/// runs that never attempted a step are rejected before aggregation.
pub fn aggregate(results: &[ExecutionResult]) -> bool {
    results.iter().all(|r| r.succeeded)
}
