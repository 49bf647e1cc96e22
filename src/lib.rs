#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Turnstile
//!
//! Attempt limiting for async Rust: count failed attempts per caller, block callers that
//! fail too often, and run protected operations through a single guard.
//!
//! ## Features
//!
//! - **Sliding failure windows** per key (`"<operation>:<identifier>"` by default)
//! - **Punitive blocks** once a key reaches its limit
//! - **Preset policies** for login, registration, password change, API and admin calls
//! - **Live policy overrides** through a lock-free [`PolicyCatalog`]
//! - **Pluggable storage** via the async [`AttemptStore`] trait
//! - **Error classification** for typed and message-encoded rate-limit errors
//! - **Tower middleware** and telemetry sinks
//!
//! ## Quick Start
//!
//! ```rust
//! use turnstile::{classify, AttemptGuard, GuardError};
//!
//! #[derive(Debug)]
//! struct InvalidCredentials;
//! impl std::fmt::Display for InvalidCredentials {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "invalid credentials")
//!     }
//! }
//! impl std::error::Error for InvalidCredentials {}
//!
//! #[tokio::main]
//! async fn main() {
//!     let guard = AttemptGuard::new();
//!
//!     for _ in 0..5 {
//!         let result = guard
//!             .login("a@example.com", || async { Err::<(), _>(InvalidCredentials) })
//!             .await;
//!         assert!(matches!(result, Err(GuardError::Inner(InvalidCredentials))));
//!     }
//!
//!     // The sixth attempt is refused without running the operation.
//!     let err = guard
//!         .login("a@example.com", || async { Ok::<_, InvalidCredentials>(()) })
//!         .await
//!         .unwrap_err();
//!     assert!(classify::is_rate_limit_error(&err));
//!     assert_eq!(classify::user_message(&err), "Too many attempts. Try again in 30 minutes.");
//! }
//! ```

mod admission;
pub mod catalog;
pub mod classify;
pub mod clock;
pub mod engine;
pub mod error;
pub mod guard;
pub mod layer;
pub mod policy;
pub mod prelude;
pub mod recorder;
pub mod store;
pub mod telemetry;

// Re-exports
pub use catalog::{PolicyCatalog, PolicyKind, UnknownPolicyKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Decision, RateLimitEngine};
pub use error::{GuardError, RateLimitExceeded, StoreError, RATE_LIMIT_EXCEEDED};
pub use guard::{AttemptGuard, Permission};
pub use layer::{AttemptGuardLayer, AttemptGuardService, Identified};
#[cfg(feature = "serde")]
pub use policy::PolicyConfig;
pub use policy::{AttemptPolicy, AttemptPolicyBuilder, KeyGenerator, PolicyError, DEFAULT_OPERATION};
pub use recorder::{AttemptRecorder, Recorded, StaleWindow};
pub use store::{AttemptRecord, AttemptStore, InMemoryAttemptStore};
