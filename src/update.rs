//! Optimistic read-transform-write updates.

use crate::backend::KeyValueStore;
use crate::config::TimedOutRead;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::observability::OperationKind;
use crate::storage::{decode_entry, StorageWorker};
use crate::wait::Outcome;

impl<S: KeyValueStore> StorageWorker<S> {
    /// Apply `transform` to the entry under `key` without locking.
    ///
    /// Each attempt reads the entry with its version, hands the decoded value
    /// (or `None`) to `transform`, and writes the result back only if nobody
    /// wrote the key in between. A lost race starts a new attempt, up to
    /// `max_update_retries` attempts in total.
    ///
    /// - Key absent: a `Some` result is stored unconditionally, `None` does nothing.
    /// - Key present: the result is written conditionally; `None` conditionally deletes.
    /// - Cancellation observed at any wait ends the update with `Ok(())` and no
    ///   further writes.
    ///
    /// `transform` may run several times and must not have side effects that
    /// assume it runs once.
    ///
    /// # Example
    ///
    /// ```ignore
    /// worker.update_entry("hits", |old: Option<Counter>| {
    ///     let mut counter = old.unwrap_or_default();
    ///     counter.value += 1;
    ///     Ok(Some(counter))
    /// })?;
    /// ```
    ///
    /// # Errors
    ///
    /// - `Error::UpdateFailed`: every attempt lost against a concurrent writer
    /// - `Error::BackendError`: the store reported a failure (not retried)
    /// - any error returned by `transform`, unchanged
    /// - encoding or decoding errors for the entry
    pub fn update_entry<T, F>(&mut self, key: &str, mut transform: F) -> Result<()>
    where
        T: CacheEntry,
        F: FnMut(Option<T>) -> Result<Option<T>>,
    {
        let store_key = self.storage.keys.build(key);
        let max_attempts = self.storage.config.max_update_retries;
        let timed_out_read = self.storage.config.timed_out_read;

        for attempt in 1..=max_attempts {
            debug!(
                "updateEntry {} (try {}/{})",
                store_key, attempt, max_attempts
            );

            let read = self.storage.waiter.wait(
                OperationKind::GetVersioned,
                &store_key,
                &self.cancel,
                self.storage.store.get_versioned(&store_key),
            );
            let versioned = match read {
                Outcome::Value(versioned) => versioned,
                Outcome::Cancelled => {
                    debug!("updateEntry {} abandoned: worker cancelled", store_key);
                    return Ok(());
                }
                Outcome::TimedOut => match timed_out_read {
                    TimedOutRead::TreatAsMiss => None,
                    TimedOutRead::Abandon => {
                        warn!("updateEntry {} abandoned: versioned read timed out", store_key);
                        return Ok(());
                    }
                },
                Outcome::Failed(err) => return Err(err),
            };

            let (old, token) = match versioned {
                Some(versioned) => {
                    let (bytes, token) = versioned.into_parts();
                    (decode_entry::<T>(&store_key, &bytes)?, Some(token))
                }
                None => (None, None),
            };

            let new = transform(old)?;

            let Some(token) = token else {
                // Nothing to conflict with.
                if let Some(entry) = &new {
                    let bytes = entry.encode()?;
                    let outcome = self.storage.waiter.wait(
                        OperationKind::Put,
                        &store_key,
                        &self.cancel,
                        self.storage.store.put(&store_key, bytes),
                    );
                    if let Outcome::Failed(err) = outcome {
                        return Err(err);
                    }
                }
                self.status.record(&store_key, new.is_some());
                return Ok(());
            };

            let present = new.is_some();
            let bytes = new.as_ref().map(CacheEntry::encode).transpose()?;
            let swap = self.storage.waiter.wait(
                OperationKind::CompareAndSwap,
                &store_key,
                &self.cancel,
                self.storage.store.compare_and_swap(&store_key, token, bytes),
            );

            match swap {
                Outcome::Value(true) => {
                    debug!("✓ updateEntry {} stored on try {}", store_key, attempt);
                    self.status.record(&store_key, present);
                    return Ok(());
                }
                Outcome::Value(false) => {
                    debug!("updateEntry {} lost a race on try {}", store_key, attempt);
                    self.storage.metrics.record_update_conflict(&store_key, attempt);
                }
                // Unknown whether it landed; the next read finds out.
                Outcome::TimedOut => {}
                Outcome::Cancelled => {
                    debug!("updateEntry {} abandoned: worker cancelled", store_key);
                    return Ok(());
                }
                Outcome::Failed(err) => return Err(err),
            }
        }

        Err(Error::UpdateFailed {
            key: key.to_string(),
            attempts: max_attempts,
        })
    }
}
