//! Decision logic: may this key proceed right now?
//!
//! Semantics of [`RateLimitEngine::check`]:
//! 1. Purge every record whose block has expired (store-wide housekeeping).
//! 2. Load the key's record; a missing record (or one whose block has run out) is a
//!    fresh cycle starting now.
//! 3. Active block: deny with the time left until it lifts.
//! 4. Window elapsed (`now - first_attempt > window`): evaluate as a fresh cycle. This
//!    reset is *not* written back.
//! 5. `attempts >= max_attempts`: start a block of `block_duration`, persist it, deny.
//! 6. Otherwise allow with `remaining = max_attempts - attempts - 1`.
//!
//! Invariants:
//! - Step 5 writes with compare-and-swap against the record read in step 2, so a block
//!   is never computed from a stale `attempts` count. A lost swap re-reads and decides
//!   again; every loss means another writer made progress on the key.
//! - `max_attempts == 0` denies on the first call.
//! - Retry-after values are whole seconds, rounded up.

use crate::clock::Clock;
use crate::error::ceil_div;
use crate::store::{AttemptRecord, AttemptStore};
use crate::AttemptPolicy;
use std::sync::Arc;
use std::time::Duration;

/// The engine's verdict for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The call may proceed.
    Allowed {
        /// Failures still tolerated in this window after the current one.
        /// Useful for `X-RateLimit-Remaining` headers.
        remaining: u32,
        /// When the current window ends (millis).
        reset_at: u64,
    },
    /// The call must not proceed.
    Denied {
        /// How long the caller should wait before retrying (whole seconds).
        /// Useful for `Retry-After` headers.
        retry_after: Duration,
        /// When the block lifts (millis).
        reset_at: u64,
    },
}

impl Decision {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Remaining failures; always 0 when denied.
    pub fn remaining(&self) -> u32 {
        match self {
            Decision::Allowed { remaining, .. } => *remaining,
            Decision::Denied { .. } => 0,
        }
    }

    /// Window end when allowed, block end when denied.
    pub fn reset_at(&self) -> u64 {
        match self {
            Decision::Allowed { reset_at, .. } | Decision::Denied { reset_at, .. } => *reset_at,
        }
    }

    /// Present only when denied.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Denied { retry_after, .. } => Some(*retry_after),
            Decision::Allowed { .. } => None,
        }
    }

    /// [`Decision::retry_after`] in seconds.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after().map(|d| d.as_secs())
    }
}

/// What a check did, for callers that report on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checked {
    pub(crate) decision: Decision,
    /// Set when this check started a block; holds the attempts that triggered it.
    pub(crate) blocked_at_attempts: Option<u32>,
    pub(crate) purged: usize,
}

/// Pure decision logic over an [`AttemptStore`].
pub struct RateLimitEngine<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for RateLimitEngine<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), clock: self.clock.clone() }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for RateLimitEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitEngine").field("store", &self.store).field("clock", &self.clock).finish()
    }
}

impl<S> RateLimitEngine<S>
where
    S: AttemptStore,
{
    /// Engine over a shared store and clock.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Decide whether `identifier` may attempt `operation` under `policy`.
    pub async fn check(
        &self,
        identifier: &str,
        policy: &AttemptPolicy,
        operation: &str,
    ) -> Result<Decision, S::Error> {
        let key = policy.key_for(identifier, operation);
        Ok(self.check_key(&key, policy).await?.decision)
    }

    /// Drop every record whose block has expired. Returns how many were removed.
    pub async fn purge(&self) -> Result<usize, S::Error> {
        self.store.purge_expired(self.clock.now_millis()).await
    }

    pub(crate) async fn check_key(
        &self,
        key: &str,
        policy: &AttemptPolicy,
    ) -> Result<Checked, S::Error> {
        let now = self.clock.now_millis();
        let purged = self.store.purge_expired(now).await?;
        if purged > 0 {
            tracing::trace!(purged, "expired blocks purged");
        }

        loop {
            let stored = self.store.get(key).await?;
            let mut record = match stored {
                Some(record) if !record.block_expired_at(now) => record,
                _ => AttemptRecord::fresh(now),
            };

            if let Some(until) = record.blocked_until.filter(|until| now < *until) {
                let retry_after = Duration::from_secs(ceil_div(until - now, 1_000));
                tracing::debug!(key, retry_after_secs = retry_after.as_secs(), "attempt denied; key blocked");
                return Ok(Checked {
                    decision: Decision::Denied { retry_after, reset_at: until },
                    blocked_at_attempts: None,
                    purged,
                });
            }

            if record.window_elapsed_at(now, policy.window_millis()) {
                record = AttemptRecord::fresh(now);
            }

            if record.attempts >= policy.max_attempts() {
                let blocked_until = now.saturating_add(policy.block_millis());
                let blocked = AttemptRecord { blocked_until: Some(blocked_until), ..record };
                if !self.store.compare_and_swap(key, stored.as_ref(), Some(blocked)).await? {
                    tracing::trace!(key, "block write lost a race; re-reading");
                    continue;
                }
                let retry_after = Duration::from_secs(ceil_div(policy.block_millis(), 1_000));
                tracing::warn!(
                    key,
                    attempts = record.attempts,
                    max_attempts = policy.max_attempts(),
                    retry_after_secs = retry_after.as_secs(),
                    "attempt limit reached; key blocked"
                );
                return Ok(Checked {
                    decision: Decision::Denied { retry_after, reset_at: blocked_until },
                    blocked_at_attempts: Some(record.attempts),
                    purged,
                });
            }

            let remaining = policy.max_attempts() - record.attempts - 1;
            let reset_at = record.first_attempt.saturating_add(policy.window_millis());
            tracing::debug!(key, attempts = record.attempts, remaining, "attempt allowed");
            return Ok(Checked {
                decision: Decision::Allowed { remaining, reset_at },
                blocked_at_attempts: None,
                purged,
            });
        }
    }
}
