//! Bounded, cancellable waits on backing store operations.
//!
//! A worker issues a store call and blocks only here, until the call
//! completes, the configured timeout elapses, or the worker's cancellation
//! token fires. Timeouts and cancellation are not errors; they come back as
//! distinct [`Outcome`] variants so every call site picks its own policy.

use crate::error::{Error, Result};
use crate::observability::{OperationKind, OutcomeKind, StorageMetrics};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Result of waiting on one store operation.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation completed.
    Value(T),
    /// The timeout elapsed first. The request may still land on the store.
    TimedOut,
    /// The worker was cancelled while waiting.
    Cancelled,
    /// The store reported a failure.
    Failed(Error),
}

impl<T> Outcome<T> {
    /// Collapse to "value or no result", propagating store failures.
    ///
    /// # Errors
    /// Returns the store's error for `Outcome::Failed`.
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            Outcome::Value(value) => Ok(Some(value)),
            Outcome::TimedOut | Outcome::Cancelled => Ok(None),
            Outcome::Failed(err) => Err(err),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Value(_) => OutcomeKind::Completed,
            Outcome::TimedOut => OutcomeKind::TimedOut,
            Outcome::Cancelled => OutcomeKind::Cancelled,
            Outcome::Failed(_) => OutcomeKind::Failed,
        }
    }
}

/// Drives store futures to an [`Outcome`] on the calling thread.
#[derive(Clone)]
pub struct Waiter {
    runtime: Handle,
    timeout: Option<Duration>,
    metrics: Arc<dyn StorageMetrics>,
}

impl Waiter {
    /// `runtime` must belong to a multi-thread runtime: its worker threads
    /// drive the timer and I/O while the caller blocks.
    pub fn new(
        runtime: Handle,
        timeout: Option<Duration>,
        metrics: Arc<dyn StorageMetrics>,
    ) -> Self {
        Waiter {
            runtime,
            timeout,
            metrics,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn runtime(&self) -> Handle {
        self.runtime.clone()
    }

    /// Block until `operation` resolves, the timeout elapses, or `cancel` fires.
    ///
    /// A token that is already cancelled wins immediately. The token is left
    /// cancelled afterwards, so the worker keeps observing the signal.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context.
    pub fn wait<T, F>(
        &self,
        kind: OperationKind,
        key: &str,
        cancel: &CancellationToken,
        operation: F,
    ) -> Outcome<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let timeout = self.timeout;

        let outcome = self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Outcome::Cancelled,
                outcome = bounded(timeout, operation) => outcome,
            }
        });

        let elapsed = started.elapsed();
        match &outcome {
            Outcome::Value(_) => {
                debug!("{} on key {} took {} ms", kind, key, elapsed.as_millis());
            }
            Outcome::TimedOut => {
                warn!("{} on key {} timed out after {} ms", kind, key, elapsed.as_millis());
            }
            Outcome::Cancelled => {
                warn!("{} on key {} was interrupted after {} ms", kind, key, elapsed.as_millis());
            }
            Outcome::Failed(err) => {
                error!("{} on key {} failed after {} ms: {}", kind, key, elapsed.as_millis(), err);
            }
        }
        self.metrics.record_operation(kind, key, elapsed, outcome.kind());

        outcome
    }
}

async fn bounded<T, F>(timeout: Option<Duration>, operation: F) -> Outcome<T>
where
    F: Future<Output = Result<T>>,
{
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => return Outcome::TimedOut,
        },
        None => operation.await,
    };

    match result {
        Ok(value) => Outcome::Value(value),
        Err(err) => Outcome::Failed(err),
    }
}
