use std::fmt;
use std::time::Duration;

#[cfg(feature = "telemetry-json")]
use serde_json::json;

/// Events emitted by the attempt guard.
///
/// Keys are the derived store keys (`"<operation>:<identifier>"` or the policy's
/// generated key), never the raw policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimiterEvent {
    /// A decision let the call through.
    Allowed {
        /// Store key.
        key: String,
        /// Failures still tolerated in this window after this one.
        remaining: u32,
    },
    /// A decision refused the call because a block is already in force.
    Denied {
        /// Store key.
        key: String,
        /// Time until the block lifts.
        retry_after: Duration,
    },
    /// A decision found the key over its limit and started a block.
    Blocked {
        /// Store key.
        key: String,
        /// Failures counted when the block triggered.
        attempts: u32,
        /// Length of the block.
        block: Duration,
    },
    /// A failed operation was counted.
    FailureRecorded {
        /// Store key.
        key: String,
        /// Failures in the window after counting this one.
        attempts: u32,
    },
    /// A successful operation wiped the key's history.
    Cleared {
        /// Store key.
        key: String,
    },
    /// An administrator reset the key.
    Reset {
        /// Store key.
        key: String,
    },
    /// Housekeeping dropped records whose block had expired.
    Purged {
        /// Records removed.
        count: usize,
    },
}

impl LimiterEvent {
    /// Store key the event concerns, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            LimiterEvent::Allowed { key, .. }
            | LimiterEvent::Denied { key, .. }
            | LimiterEvent::Blocked { key, .. }
            | LimiterEvent::FailureRecorded { key, .. }
            | LimiterEvent::Cleared { key }
            | LimiterEvent::Reset { key } => Some(key),
            LimiterEvent::Purged { .. } => None,
        }
    }

    /// Short snake_case name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            LimiterEvent::Allowed { .. } => "allowed",
            LimiterEvent::Denied { .. } => "denied",
            LimiterEvent::Blocked { .. } => "blocked",
            LimiterEvent::FailureRecorded { .. } => "failure_recorded",
            LimiterEvent::Cleared { .. } => "cleared",
            LimiterEvent::Reset { .. } => "reset",
            LimiterEvent::Purged { .. } => "purged",
        }
    }
}

impl fmt::Display for LimiterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimiterEvent::Allowed { key, remaining } => {
                write!(f, "Allowed({}, remaining={})", key, remaining)
            }
            LimiterEvent::Denied { key, retry_after } => {
                write!(f, "Denied({}, retry_after={:?})", key, retry_after)
            }
            LimiterEvent::Blocked { key, attempts, block } => {
                write!(f, "Blocked({}, attempts={}, block={:?})", key, attempts, block)
            }
            LimiterEvent::FailureRecorded { key, attempts } => {
                write!(f, "FailureRecorded({}, attempts={})", key, attempts)
            }
            LimiterEvent::Cleared { key } => write!(f, "Cleared({})", key),
            LimiterEvent::Reset { key } => write!(f, "Reset({})", key),
            LimiterEvent::Purged { count } => write!(f, "Purged(count={})", count),
        }
    }
}

#[cfg_attr(not(feature = "telemetry-json"), allow(dead_code))]
#[inline]
fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

/// Convert a LimiterEvent into a JSON value for sinks.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &LimiterEvent) -> serde_json::Value {
    match event {
        LimiterEvent::Allowed { key, remaining } => json!({
            "kind": "allowed",
            "key": key,
            "remaining": *remaining,
        }),
        LimiterEvent::Denied { key, retry_after } => json!({
            "kind": "denied",
            "key": key,
            "retry_after_ms": clamp_u64(retry_after.as_millis()),
        }),
        LimiterEvent::Blocked { key, attempts, block } => json!({
            "kind": "blocked",
            "key": key,
            "attempts": *attempts,
            "block_ms": clamp_u64(block.as_millis()),
        }),
        LimiterEvent::FailureRecorded { key, attempts } => json!({
            "kind": "failure_recorded",
            "key": key,
            "attempts": *attempts,
        }),
        LimiterEvent::Cleared { key } => json!({ "kind": "cleared", "key": key }),
        LimiterEvent::Reset { key } => json!({ "kind": "reset", "key": key }),
        LimiterEvent::Purged { count } => json!({ "kind": "purged", "count": *count }),
    }
}
