//! Metrics hooks for storage operations.

use std::fmt;
use std::time::Duration;

/// Backing store call made by the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Put,
    Get,
    Delete,
    GetVersioned,
    CompareAndSwap,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Put => "put",
            OperationKind::Get => "get",
            OperationKind::Delete => "delete",
            OperationKind::GetVersioned => "get_versioned",
            OperationKind::CompareAndSwap => "compare_and_swap",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a bounded wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Completed,
    TimedOut,
    Cancelled,
    Failed,
}

/// Trait for collecting storage metrics.
///
/// All methods default to no-ops; implement the ones you care about.
///
/// # Example
///
/// ```
/// use cache_bridge::observability::{OperationKind, OutcomeKind, StorageMetrics};
/// use std::time::Duration;
///
/// struct LogMetrics;
///
/// impl StorageMetrics for LogMetrics {
///     fn record_operation(
///         &self,
///         kind: OperationKind,
///         key: &str,
///         elapsed: Duration,
///         outcome: OutcomeKind,
///     ) {
///         println!("{} {} {:?} in {:?}", kind, key, outcome, elapsed);
///     }
/// }
/// ```
pub trait StorageMetrics: Send + Sync {
    /// One backing store round trip finished (or was given up on).
    fn record_operation(
        &self,
        _kind: OperationKind,
        _key: &str,
        _elapsed: Duration,
        _outcome: OutcomeKind,
    ) {
    }

    /// `get` answered from the worker's presence memo without a round trip.
    fn record_status_hit(&self, _key: &str) {}

    /// A conditional write lost against a concurrent writer.
    fn record_update_conflict(&self, _key: &str, _attempt: u32) {}
}

/// Default metrics sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl StorageMetrics for NoOpMetrics {}
