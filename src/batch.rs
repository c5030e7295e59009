//! Bounded, paced batch processing.
//!
//! Items are split into chunks of `batch_size`. All items of a chunk run
//! concurrently on the current task; chunks run one after another with a pause in
//! between, which bounds the load placed on the host page.

use std::fmt;
use std::future::Future;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::options::BatchOptions;
use crate::wait::pause;
use crate::{Error, Result};

/// Outcome for one input position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItem<R> {
    Ok(R),
    /// The worker failed; the message is its error's `Display`.
    Failed(String),
    /// Never processed because the batch was cancelled.
    Skipped,
}

impl<R> BatchItem<R> {
    #[must_use]
    pub fn ok(&self) -> Option<&R> {
        match self {
            Self::Ok(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_ok(self) -> Option<R> {
        match self {
            Self::Ok(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Run `worker` over `items` in paced, bounded chunks.
///
/// The worker receives each item with its input position. The returned vector has
/// one entry per input item, at the same position, whatever order the workers
/// finished in. On cancellation the positions not yet completed are
/// [`BatchItem::Skipped`].
///
/// # Errors
///
/// [`Error::BatchItemFailed`] for the first (lowest-index) failure of a chunk when
/// `continue_on_error` is off; remaining chunks are not started.
pub async fn run_batch<T, R, E, F, Fut>(
    items: Vec<T>,
    worker: F,
    options: &BatchOptions,
    cancel: &CancellationToken,
) -> Result<Vec<BatchItem<R>>>
where
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
    E: fmt::Display,
{
    let total = items.len();
    let size = options.batch_size.max(1);
    let mut results: Vec<BatchItem<R>> = Vec::with_capacity(total);
    let mut pending = items.into_iter().enumerate().peekable();
    let mut chunk_number = 0usize;

    while pending.peek().is_some() {
        if chunk_number > 0 && pause(options.delay(), cancel).await.is_err() {
            break;
        }
        if cancel.is_cancelled() {
            break;
        }

        let chunk: Vec<(usize, T)> = pending.by_ref().take(size).collect();
        let running = join_all(chunk.into_iter().map(|(index, item)| {
            let fut = worker(item, index);
            async move { (index, fut.await) }
        }));

        let outcomes = tokio::select! {
            outcomes = running => outcomes,
            () = cancel.cancelled() => {
                tracing::debug!(chunk = chunk_number, "batch cancelled mid-chunk");
                break;
            }
        };

        for (index, outcome) in outcomes {
            match outcome {
                Ok(value) => results.push(BatchItem::Ok(value)),
                Err(err) => {
                    let message = err.to_string();
                    if !options.continue_on_error {
                        tracing::warn!(index, error = %message, "batch item failed, aborting");
                        return Err(Error::BatchItemFailed { index, message });
                    }
                    tracing::debug!(index, error = %message, "batch item failed");
                    results.push(BatchItem::Failed(message));
                }
            }
        }

        chunk_number += 1;
    }

    if results.len() < total {
        tracing::debug!(completed = results.len(), total, "batch stopped early");
    }
    results.resize_with(total, || BatchItem::Skipped);
    Ok(results)
}
