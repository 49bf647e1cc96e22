//! Convenient re-exports for common Turnstile types.
pub use crate::{
    classify::{is_rate_limit_error, user_message},
    catalog::{PolicyCatalog, PolicyKind},
    clock::{Clock, SystemClock},
    engine::Decision,
    error::{GuardError, RateLimitExceeded},
    guard::{AttemptGuard, Permission},
    layer::{AttemptGuardLayer, Identified},
    policy::AttemptPolicy,
    recorder::StaleWindow,
    store::{AttemptStore, InMemoryAttemptStore},
};
