//! Attempt policies: how many failures a key may accumulate, over what window, and how
//! long the punitive block lasts once the limit is hit.
//!
//! Semantics:
//! - `max_attempts` counts *failed* attempts inside one window. `0` means every decision
//!   denies.
//! - `window` is measured from the first failure of the current cycle. `Duration::ZERO`
//!   effectively disables the sliding window.
//! - `block_duration` is how long all attempts are denied once a block triggers.
//!
//! Invariants:
//! - Zero is valid for every field; degenerate policies deny rather than fail.
//! - `window` and `block_duration` always fit in `u64` milliseconds.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use turnstile::AttemptPolicy;
//!
//! let policy = AttemptPolicy::builder()
//!     .max_attempts(3)
//!     .window(Duration::from_secs(60))
//!     .block_duration(Duration::from_secs(300))
//!     .key_generator(|id| format!("tenant-a:{}", id.to_lowercase()))
//!     .build()
//!     .unwrap();
//! assert_eq!(policy.key_for("Bob@Example.com", "login"), "tenant-a:bob@example.com");
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Operation label used when callers don't name one.
pub const DEFAULT_OPERATION: &str = "default";

/// Overrides how a store key is derived from an identifier.
pub type KeyGenerator = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Errors produced when validating a policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The window does not fit in u64 milliseconds.
    #[error("window must fit in u64 milliseconds (got {0:?})")]
    WindowOverflow(Duration),
    /// The block duration does not fit in u64 milliseconds.
    #[error("block_duration must fit in u64 milliseconds (got {0:?})")]
    BlockDurationOverflow(Duration),
}

/// Immutable limits for one class of operation.
#[derive(Clone)]
pub struct AttemptPolicy {
    max_attempts: u32,
    window_millis: u64,
    block_millis: u64,
    key_generator: Option<KeyGenerator>,
}

impl std::fmt::Debug for AttemptPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("window_millis", &self.window_millis)
            .field("block_millis", &self.block_millis)
            .field("key_generator", &self.key_generator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl PartialEq for AttemptPolicy {
    // Key generators are compared by identity.
    fn eq(&self, other: &Self) -> bool {
        let same_keys = match (&self.key_generator, &other.key_generator) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.max_attempts == other.max_attempts
            && self.window_millis == other.window_millis
            && self.block_millis == other.block_millis
            && same_keys
    }
}

impl AttemptPolicy {
    /// Create a policy from whole milliseconds. Infallible; used by the preset catalog.
    pub const fn from_millis(max_attempts: u32, window_millis: u64, block_millis: u64) -> Self {
        Self { max_attempts, window_millis, block_millis, key_generator: None }
    }

    /// Validating constructor.
    pub fn new(
        max_attempts: u32,
        window: Duration,
        block_duration: Duration,
    ) -> Result<Self, PolicyError> {
        Self::builder()
            .max_attempts(max_attempts)
            .window(window)
            .block_duration(block_duration)
            .build()
    }

    /// Start a builder (defaults: 5 attempts, 15 minute window, 30 minute block).
    pub fn builder() -> AttemptPolicyBuilder {
        AttemptPolicyBuilder::new()
    }

    /// Replace the key derivation for this policy.
    pub fn with_key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    /// Failures allowed inside one window before blocking.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sliding window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_millis)
    }

    /// Punitive block length.
    pub fn block_duration(&self) -> Duration {
        Duration::from_millis(self.block_millis)
    }

    pub(crate) fn window_millis(&self) -> u64 {
        self.window_millis
    }

    pub(crate) fn block_millis(&self) -> u64 {
        self.block_millis
    }

    /// True when a custom key generator is installed.
    pub fn has_key_generator(&self) -> bool {
        self.key_generator.is_some()
    }

    /// Derive the store key: the key generator's output when present, otherwise
    /// `"<operation>:<identifier>"`.
    pub fn key_for(&self, identifier: &str, operation: &str) -> String {
        match &self.key_generator {
            Some(generate) => generate(identifier),
            None => format!("{}:{}", operation, identifier),
        }
    }
}

/// Builder for [`AttemptPolicy`].
pub struct AttemptPolicyBuilder {
    max_attempts: u32,
    window: Duration,
    block_duration: Duration,
    key_generator: Option<KeyGenerator>,
}

impl AttemptPolicyBuilder {
    /// Builder seeded with the login preset values.
    pub fn new() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
            block_duration: Duration::from_secs(30 * 60),
            key_generator: None,
        }
    }

    /// Failures allowed per window. `0` denies everything.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sliding window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Block length once the limit is reached.
    pub fn block_duration(mut self, block_duration: Duration) -> Self {
        self.block_duration = block_duration;
        self
    }

    /// Custom key derivation.
    pub fn key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<AttemptPolicy, PolicyError> {
        let window_millis = u64::try_from(self.window.as_millis())
            .map_err(|_| PolicyError::WindowOverflow(self.window))?;
        let block_millis = u64::try_from(self.block_duration.as_millis())
            .map_err(|_| PolicyError::BlockDurationOverflow(self.block_duration))?;
        Ok(AttemptPolicy {
            max_attempts: self.max_attempts,
            window_millis,
            block_millis,
            key_generator: self.key_generator,
        })
    }
}

impl Default for AttemptPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable policy settings, in milliseconds.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PolicyConfig {
    /// Failures allowed per window.
    pub max_attempts: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Block length in milliseconds.
    pub block_duration_ms: u64,
}

#[cfg(feature = "serde")]
impl From<PolicyConfig> for AttemptPolicy {
    fn from(config: PolicyConfig) -> Self {
        AttemptPolicy::from_millis(config.max_attempts, config.window_ms, config.block_duration_ms)
    }
}

#[cfg(feature = "serde")]
impl From<&AttemptPolicy> for PolicyConfig {
    fn from(policy: &AttemptPolicy) -> Self {
        PolicyConfig {
            max_attempts: policy.max_attempts,
            window_ms: policy.window_millis,
            block_duration_ms: policy.block_millis,
        }
    }
}
