//! Sequential bulk mutation driver.
//!
//! Applies one mutation per record, strictly in enumeration order, skipping
//! excluded records without a backend call.

use std::future::Future;
use tracing::{debug, warn};

use super::error::{BulkError, BulkResult};
use super::exclusion::{ExclusionList, Keyed};

/// What to do when a single mutation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Stop at the first failure and fail the whole operation.
    pub abort_on_first_error: bool,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::abort()
    }
}

impl BatchPolicy {
    pub fn abort() -> Self {
        Self {
            abort_on_first_error: true,
        }
    }

    pub fn keep_going() -> Self {
        Self {
            abort_on_first_error: false,
        }
    }
}

/// A mutation that failed under the keep-going policy.
#[derive(Debug)]
pub struct BatchFailure {
    pub key: String,
    pub error: BulkError,
}

/// Outcome of a bulk mutation pass.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Mutations that succeeded.
    pub processed: usize,
    /// Records skipped by the exclusion list.
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run `mutate` on every non-excluded record.
///
/// Under the default policy the first failing mutation aborts the batch and
/// is returned as the operation's error; earlier mutations are not undone.
pub async fn apply_to_all<'a, T, F, Fut, E>(
    records: &'a [T],
    exclusions: &ExclusionList,
    policy: BatchPolicy,
    mut mutate: F,
) -> BulkResult<BatchReport>
where
    T: Keyed,
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Into<BulkError>,
{
    let mut report = BatchReport::default();

    for record in records {
        if exclusions.is_excluded(record) {
            debug!(key = record.key(), "Skipping excluded record");
            report.skipped += 1;
            continue;
        }

        match mutate(record).await {
            Ok(()) => report.processed += 1,
            Err(e) => {
                let error = e.into();
                if policy.abort_on_first_error {
                    warn!(key = record.key(), processed = report.processed, "Batch aborted");
                    return Err(error);
                }
                warn!(key = record.key(), %error, "Mutation failed, continuing");
                report.failures.push(BatchFailure {
                    key: record.key().to_string(),
                    error,
                });
            }
        }
    }

    Ok(report)
}
