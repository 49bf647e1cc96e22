//! Records the outcome of an operation that was allowed to run.
//!
//! A success wipes the key's history. A failure increments `attempts` and stamps
//! `last_attempt`, creating the record if needed. The increment is a compare-and-swap
//! retried until it lands, so concurrent failures are never lost. The recorder never
//! starts a block: that only happens when the engine next evaluates the key.
//!
//! How a failure treats a record whose window has already elapsed is configurable via
//! [`StaleWindow`].

use crate::clock::Clock;
use crate::store::{AttemptRecord, AttemptStore};
use crate::AttemptPolicy;
use std::sync::Arc;

/// How a failure treats a record whose window has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StaleWindow {
    /// Start a new window at `now` before counting the failure, so the stored counter
    /// always matches what the engine evaluates.
    #[default]
    Restart,
    /// Increment the stale record as-is. The engine still evaluates a fresh window, but
    /// the stored counter keeps growing until a success or a block clears it.
    Carry,
}

/// What [`AttemptRecorder::record`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// A success cleared the key. `existed` is false if there was nothing to clear.
    Cleared {
        /// Whether a record was removed.
        existed: bool,
    },
    /// A failure was counted.
    Failure {
        /// Failures in the window after this one.
        attempts: u32,
    },
}

/// Writes operation outcomes to an [`AttemptStore`].
pub struct AttemptRecorder<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    stale_window: StaleWindow,
}

impl<S> Clone for AttemptRecorder<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), clock: self.clock.clone(), stale_window: self.stale_window }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for AttemptRecorder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptRecorder")
            .field("store", &self.store)
            .field("stale_window", &self.stale_window)
            .finish()
    }
}

impl<S> AttemptRecorder<S>
where
    S: AttemptStore,
{
    /// Recorder with the default [`StaleWindow::Restart`] behaviour.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, stale_window: StaleWindow::default() }
    }

    /// Change how stale windows are handled.
    pub fn with_stale_window(mut self, stale_window: StaleWindow) -> Self {
        self.stale_window = stale_window;
        self
    }

    /// Current stale-window mode.
    pub fn stale_window(&self) -> StaleWindow {
        self.stale_window
    }

    /// Record the outcome of one attempt at `operation` by `identifier`.
    pub async fn record(
        &self,
        identifier: &str,
        policy: &AttemptPolicy,
        success: bool,
        operation: &str,
    ) -> Result<Recorded, S::Error> {
        let key = policy.key_for(identifier, operation);
        if success {
            self.clear_key(&key).await
        } else {
            self.fail_key(&key, policy).await
        }
    }

    pub(crate) async fn clear_key(&self, key: &str) -> Result<Recorded, S::Error> {
        let existed = self.store.remove(key).await?.is_some();
        if existed {
            tracing::debug!(key, "attempt history cleared");
        }
        Ok(Recorded::Cleared { existed })
    }

    pub(crate) async fn fail_key(
        &self,
        key: &str,
        policy: &AttemptPolicy,
    ) -> Result<Recorded, S::Error> {
        let now = self.clock.now_millis();
        loop {
            let stored = self.store.get(key).await?;
            let mut record = stored.unwrap_or(AttemptRecord::fresh(now));

            if self.stale_window == StaleWindow::Restart && self.is_stale(&record, now, policy) {
                record = AttemptRecord::fresh(now);
            }
            record.attempts = record.attempts.saturating_add(1);
            record.last_attempt = now;

            if self.store.compare_and_swap(key, stored.as_ref(), Some(record)).await? {
                tracing::debug!(key, attempts = record.attempts, "failed attempt recorded");
                return Ok(Recorded::Failure { attempts: record.attempts });
            }
            tracing::trace!(key, "failure write lost a race; re-reading");
        }
    }

    fn is_stale(&self, record: &AttemptRecord, now: u64, policy: &AttemptPolicy) -> bool {
        record.block_expired_at(now)
            || (!record.is_blocked_at(now) && record.window_elapsed_at(now, policy.window_millis()))
    }
}
