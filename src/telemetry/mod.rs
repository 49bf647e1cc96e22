//! Telemetry for the attempt limiter.
//!
//! The guard emits a [`LimiterEvent`] after every decision and every state change it
//! makes. Events flow through a [`TelemetrySink`], which is a
//! `tower::Service<LimiterEvent>` so sinks compose like any other service.
//!
//! # Event Types
//!
//! - **Decisions**: `Allowed`, `Denied`, `Blocked`
//! - **Accounting**: `FailureRecorded`, `Cleared`
//! - **Administration**: `Reset`
//! - **Housekeeping**: `Purged`
//!
//! Emission is best-effort: a sink error never changes a decision.

pub mod events;
pub mod sinks;

pub use events::LimiterEvent;
#[cfg(feature = "telemetry-json")]
pub use events::event_to_json;
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
