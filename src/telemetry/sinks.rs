use super::events::LimiterEvent;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tower::Service;

type SinkFuture = BoxFuture<'static, Result<(), Infallible>>;

/// Destination for [`LimiterEvent`]s: any cloneable `tower::Service` over them.
pub trait TelemetrySink:
    Service<LimiterEvent, Response = (), Error = Self::SinkError> + Clone + Send + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Deliver one event, waiting for the sink to be ready. Sink errors are dropped.
pub async fn emit_best_effort<S>(sink: S, event: LimiterEvent)
where
    S: Service<LimiterEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready) = sink.ready_oneshot().await {
        let _ = ready.call(event).await;
    }
}

/// Discards every event. The guard's default.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<LimiterEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: LimiterEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// Writes events to `tracing` under the `turnstile::events` target.
///
/// Blocks log at `WARN`, administrative resets at `INFO`, denials and housekeeping at
/// `DEBUG` and per-call accounting at `TRACE`.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl LogSink {
    fn log(event: &LimiterEvent) {
        let kind = event.kind();
        match event {
            LimiterEvent::Blocked { key, attempts, block } => tracing::warn!(
                target: "turnstile::events",
                kind,
                key = %key,
                attempts,
                block_secs = block.as_secs(),
                "{event}"
            ),
            LimiterEvent::Reset { key } => {
                tracing::info!(target: "turnstile::events", kind, key = %key, "{event}")
            }
            LimiterEvent::Denied { key, retry_after } => tracing::debug!(
                target: "turnstile::events",
                kind,
                key = %key,
                retry_after_secs = retry_after.as_secs(),
                "{event}"
            ),
            LimiterEvent::Purged { count } => {
                tracing::debug!(target: "turnstile::events", kind, count, "{event}")
            }
            _ => tracing::trace!(target: "turnstile::events", kind, key = event.key(), "{event}"),
        }
    }
}

impl Service<LimiterEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: LimiterEvent) -> Self::Future {
        Self::log(&event);
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

#[derive(Debug, Default)]
struct History {
    events: VecDeque<LimiterEvent>,
    evicted: u64,
}

/// Keeps the most recent events in memory for inspection, mostly from tests.
///
/// Clones share one history.
#[derive(Clone, Debug)]
pub struct MemorySink {
    history: Arc<Mutex<History>>,
    capacity: usize,
}

impl MemorySink {
    /// Sink holding up to 10 000 events.
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Sink holding up to `capacity` events (at least one). Older events are evicted.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { history: Arc::default(), capacity: capacity.max(1) }
    }

    /// Every retained event, oldest first.
    pub fn events(&self) -> Vec<LimiterEvent> {
        self.lock().events.iter().cloned().collect()
    }

    /// Retained events about one store key, oldest first.
    pub fn events_for(&self, key: &str) -> Vec<LimiterEvent> {
        self.lock().events.iter().filter(|event| event.key() == Some(key)).cloned().collect()
    }

    /// Store keys that were blocked, in the order the blocks started. A key blocked
    /// twice appears twice.
    pub fn blocked_keys(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                LimiterEvent::Blocked { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget retained events. The eviction count is kept.
    pub fn clear(&self) {
        self.lock().events.clear();
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// True when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Events dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<LimiterEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: LimiterEvent) -> Self::Future {
        let mut history = self.lock();
        if history.events.len() >= self.capacity {
            history.events.pop_front();
            history.evicted += 1;
        }
        history.events.push_back(event);
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}
