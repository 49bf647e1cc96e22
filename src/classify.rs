//! Recognise rate-limit errors and turn them into user-facing text.
//!
//! Two forms are treated as equivalent:
//! - a [`RateLimitExceeded`] anywhere in the `source()` chain;
//! - any error in the chain whose message contains `RATE_LIMIT_EXCEEDED:<minutes>`,
//!   as produced by services that only forward message strings.
//!
//! The typed form yields an exact retry-after in seconds. The message form only carries
//! whole minutes, so its retry-after is `minutes * 60`.

use crate::error::{RateLimitExceeded, RATE_LIMIT_EXCEEDED};
use std::error::Error;
use std::time::Duration;

/// Either form of a rate-limit error found in a chain.
enum Found<'a> {
    Typed(&'a RateLimitExceeded),
    Encoded { minutes: u64 },
}

impl Found<'_> {
    fn retry_after(&self) -> Duration {
        match self {
            Found::Typed(denied) => denied.retry_after(),
            Found::Encoded { minutes } => Duration::from_secs(minutes.saturating_mul(60)),
        }
    }

    fn minutes(&self) -> u64 {
        match self {
            Found::Typed(denied) => denied.retry_after_minutes(),
            Found::Encoded { minutes } => *minutes,
        }
    }
}

fn chain<'a>(err: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

// The typed form wins even when an outer wrapper's message also carries the marker.
fn find<'a>(err: &'a (dyn Error + 'static)) -> Option<Found<'a>> {
    chain(err)
        .find_map(|e| e.downcast_ref::<RateLimitExceeded>().map(Found::Typed))
        .or_else(|| {
            chain(err).find_map(|e| {
                parse_encoded_minutes(&e.to_string()).map(|minutes| Found::Encoded { minutes })
            })
        })
}

/// Extract `<minutes>` from a message containing `RATE_LIMIT_EXCEEDED:<minutes>`.
///
/// ```rust
/// use turnstile::classify::parse_encoded_minutes;
///
/// assert_eq!(parse_encoded_minutes("RATE_LIMIT_EXCEEDED:5"), Some(5));
/// assert_eq!(parse_encoded_minutes("login failed: RATE_LIMIT_EXCEEDED:12 (retry)"), Some(12));
/// assert_eq!(parse_encoded_minutes("RATE_LIMIT_EXCEEDED:soon"), None);
/// ```
pub fn parse_encoded_minutes(message: &str) -> Option<u64> {
    message.match_indices(RATE_LIMIT_EXCEEDED).find_map(|(at, marker)| {
        let rest = message[at + marker.len()..].strip_prefix(':')?;
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        rest[..end].parse().ok()
    })
}

/// True if `err`, or anything it was caused by, is a rate-limit denial.
pub fn is_rate_limit_error(err: &(dyn Error + 'static)) -> bool {
    find(err).is_some()
}

/// Retry-after carried by a rate-limit error, in whole seconds.
pub fn retry_after(err: &(dyn Error + 'static)) -> Option<Duration> {
    find(err).map(|found| found.retry_after())
}

/// `"Too many attempts. Try again in N minutes."` for rate-limit errors.
pub fn rate_limit_message(err: &(dyn Error + 'static)) -> Option<String> {
    find(err).map(|found| format!("Too many attempts. Try again in {} minutes.", found.minutes()))
}

/// Text safe to show an end user: the rate-limit message, or the error's own message.
pub fn user_message(err: &(dyn Error + 'static)) -> String {
    rate_limit_message(err).unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardError;
    use std::fmt;
    use std::io;

    #[derive(Debug)]
    struct Wrapped(Box<dyn Error + Send + Sync>);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "request failed")
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self.0.as_ref())
        }
    }

    // Forwards the cause's message, so the marker appears on the outer error too.
    #[derive(Debug)]
    struct EncodedWrapper(GuardError<io::Error>);

    impl fmt::Display for EncodedWrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "upstream said {}", self.0)
        }
    }

    impl Error for EncodedWrapper {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn encoded_message_classifies_with_exact_seconds() {
        let err = io::Error::new(io::ErrorKind::Other, "RATE_LIMIT_EXCEEDED:5");
        assert!(is_rate_limit_error(&err));
        assert_eq!(retry_after(&err), Some(Duration::from_secs(300)));
        assert_eq!(
            rate_limit_message(&err).as_deref(),
            Some("Too many attempts. Try again in 5 minutes.")
        );
    }

    #[test]
    fn typed_error_keeps_second_precision() {
        let err = RateLimitExceeded::new(90, "login");
        assert!(is_rate_limit_error(&err));
        assert_eq!(retry_after(&err), Some(Duration::from_secs(90)));
        assert_eq!(user_message(&err), "Too many attempts. Try again in 2 minutes.");
    }

    #[test]
    fn guard_error_is_found_through_the_chain() {
        let err: GuardError<io::Error> = RateLimitExceeded::new(90, "login").into();
        assert!(is_rate_limit_error(&err));
        assert_eq!(retry_after(&err), Some(Duration::from_secs(90)));

        let wrapped = Wrapped(Box::new(io::Error::new(io::ErrorKind::Other, "RATE_LIMIT_EXCEEDED:3")));
        assert_eq!(retry_after(&wrapped), Some(Duration::from_secs(180)));
    }

    #[test]
    fn ordinary_errors_pass_through() {
        let err = io::Error::new(io::ErrorKind::Other, "invalid credentials");
        assert!(!is_rate_limit_error(&err));
        assert_eq!(retry_after(&err), None);
        assert_eq!(user_message(&err), "invalid credentials");

        let inner: GuardError<io::Error> = GuardError::Inner(err);
        assert!(!is_rate_limit_error(&inner));
    }

    #[test]
    fn typed_error_two_levels_down_beats_an_encoded_wrapper() {
        let denied: GuardError<io::Error> = RateLimitExceeded::new(90, "login").into();
        let wrapped = Wrapped(Box::new(Wrapped(Box::new(EncodedWrapper(denied)))));
        assert_eq!(retry_after(&wrapped), Some(Duration::from_secs(90)));
        assert_eq!(user_message(&wrapped), "Too many attempts. Try again in 2 minutes.");
    }

    #[test]
    fn marker_without_minutes_is_not_a_match() {
        assert_eq!(parse_encoded_minutes("RATE_LIMIT_EXCEEDED"), None);
        assert_eq!(parse_encoded_minutes("RATE_LIMIT_EXCEEDED:"), None);
        assert_eq!(parse_encoded_minutes("RATE_LIMIT_EXCEEDED -> RATE_LIMIT_EXCEEDED:4"), Some(4));
    }
}
