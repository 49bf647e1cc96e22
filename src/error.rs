//! Error types for guarded operations
use std::fmt;
use std::time::Duration;

/// Marker carried in the message of every rate-limit error.
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

pub(crate) fn ceil_div(value: u64, divisor: u64) -> u64 {
    value / divisor + u64::from(value % divisor != 0)
}

/// A call was denied before it ran.
///
/// Displays as `RATE_LIMIT_EXCEEDED:<minutes>` (minutes rounded up), the same encoding
/// callers may receive as a bare message string, so both forms classify identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    retry_after: Duration,
    operation: String,
}

impl RateLimitExceeded {
    /// Build from a retry-after in whole seconds.
    pub fn new(retry_after_secs: u64, operation: impl Into<String>) -> Self {
        Self { retry_after: Duration::from_secs(retry_after_secs), operation: operation.into() }
    }

    /// How long until the caller may try again.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// Retry-after in seconds.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after.as_secs()
    }

    /// Retry-after in minutes, rounded up.
    pub fn retry_after_minutes(&self) -> u64 {
        ceil_div(self.retry_after_secs(), 60)
    }

    /// Label of the operation that was denied.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", RATE_LIMIT_EXCEEDED, self.retry_after_minutes())
    }
}

impl std::error::Error for RateLimitExceeded {}

/// Boxed error from an [`AttemptStore`](crate::AttemptStore) backend.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for guarded operations
#[derive(Debug)]
pub enum GuardError<E> {
    /// The limiter denied the call; the operation never ran and nothing was recorded.
    RateLimited(RateLimitExceeded),
    /// The operation ran and failed. The failure was recorded; the error is untouched.
    Inner(E),
    /// The attempt store failed before the operation could run.
    Store(StoreError),
}

impl<E: fmt::Display> fmt::Display for GuardError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(denied) => write!(f, "{}", denied),
            Self::Inner(e) => write!(f, "{}", e),
            Self::Store(e) => write!(f, "attempt store failure: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GuardError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RateLimited(denied) => Some(denied),
            Self::Inner(e) => Some(e),
            Self::Store(e) => Some(e.as_ref()),
        }
    }
}

impl<E> From<RateLimitExceeded> for GuardError<E> {
    fn from(denied: RateLimitExceeded) -> Self {
        GuardError::RateLimited(denied)
    }
}

impl<E> GuardError<E> {
    pub(crate) fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        GuardError::Store(Box::new(err))
    }

    /// Check if the limiter denied the call
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
    /// Check if this error wraps the operation's own error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }
    /// Check if the attempt store failed
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
    /// Denial details, if the limiter refused the call.
    pub fn rate_limit(&self) -> Option<&RateLimitExceeded> {
        match self {
            Self::RateLimited(denied) => Some(denied),
            _ => None,
        }
    }
    /// Retry-after for a denial.
    pub fn retry_after(&self) -> Option<Duration> {
        self.rate_limit().map(RateLimitExceeded::retry_after)
    }
    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}
