//! Batch fan-out with per-item outcomes.
//!
//! The `BatchCoordinator` dispatches every item of a batch concurrently via
//! `tokio::JoinSet` and gathers one [`BatchItemResult`] per item, in input
//! order. A failing (or panicking) item never affects its siblings, and
//! nothing is rolled back.
//!
//! # Execution flow
//!
//! 1. Reject the whole batch if it exceeds `max_batch_size` (nothing dispatched).
//! 2. Spawn one task per item, tagged with its input position.
//! 3. Collect completions until all finished or the optional deadline passes.
//! 4. Items still running at the deadline are reported as timed out and left
//!    to finish in the background.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use docmem_types::batch::{BatchItemResult, DEFAULT_MAX_BATCH_SIZE};
use docmem_types::error::VectorStoreError;
use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Error text of items still running at the batch deadline.
pub const TIMED_OUT: &str = "timed out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCoordinator {
    max_batch_size: usize,
    timeout: Option<Duration>,
}

impl Default for BatchCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE)
    }
}

impl BatchCoordinator {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            timeout: None,
        }
    }

    /// Bound the wait for a batch. Unfinished items become per-item errors.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn check_size(&self, len: usize) -> Result<(), VectorStoreError> {
        if len > self.max_batch_size {
            return Err(VectorStoreError::validation(format!(
                "batch of {len} items exceeds the maximum of {}",
                self.max_batch_size
            )));
        }
        Ok(())
    }

    /// Run `op` for every item concurrently and return the outcomes in input order.
    ///
    /// Fails only when the batch is oversized, before `op` is ever called.
    pub async fn run<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        mut op: F,
    ) -> Result<Vec<BatchItemResult<T>>, VectorStoreError>
    where
        F: FnMut(usize, I) -> Fut,
        Fut: Future<Output = Result<T, VectorStoreError>> + Send + 'static,
        T: Send + 'static,
    {
        self.check_size(items.len())?;

        let total = items.len();
        let mut join_set = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let task = op(index, item);
            join_set.spawn(async move { (index, AssertUnwindSafe(task).catch_unwind().await) });
        }
        debug!(items = total, "batch dispatched");

        let mut slots: Vec<Option<BatchItemResult<T>>> = (0..total).map(|_| None).collect();
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => join_set.join_next().await,
            };

            let Some(joined) = next else { break };
            match joined {
                Ok((index, Ok(Ok(value)))) => {
                    slots[index] = Some(BatchItemResult::ok(index, value));
                }
                Ok((index, Ok(Err(e)))) => {
                    warn!(index, error = %e, "batch item failed");
                    slots[index] = Some(BatchItemResult::error(index, e.to_string()));
                }
                Ok((index, Err(panic))) => {
                    let message = panic_message(panic.as_ref());
                    warn!(index, panic = %message, "batch item panicked");
                    slots[index] = Some(BatchItemResult::error(index, format!("panicked: {message}")));
                }
                // Panics are caught inside the task; this is an external abort.
                Err(e) => warn!(error = %e, "batch task aborted"),
            }
        }

        if timed_out {
            let pending = join_set.len();
            join_set.detach_all();
            warn!(pending, "batch deadline passed; unfinished items continue in the background");
        }

        Ok(slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    BatchItemResult::error(index, if timed_out { TIMED_OUT } else { "aborted" })
                })
            })
            .collect())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
