//! Batch outcome types.
//!
//! A batch produces one `BatchItemResult` per input item, in input order,
//! regardless of the order in which the items completed.

use serde::{Deserialize, Serialize};

/// Default maximum number of items accepted in one batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Ok,
    Error,
}

/// Outcome of a single batch item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult<T> {
    /// Position of the item in the submitted batch.
    pub index: usize,
    pub status: BatchStatus,
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> BatchItemResult<T> {
    pub fn ok(index: usize, result: T) -> Self {
        Self {
            index,
            status: BatchStatus::Ok,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(index: usize, error: impl Into<String>) -> Self {
        Self {
            index,
            status: BatchStatus::Error,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == BatchStatus::Ok
    }
}

/// Ordered outcomes plus counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse<T> {
    pub results: Vec<BatchItemResult<T>>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl<T> From<Vec<BatchItemResult<T>>> for BatchResponse<T> {
    fn from(results: Vec<BatchItemResult<T>>) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        Self {
            results,
            total,
            succeeded,
            failed: total - succeeded,
        }
    }
}
