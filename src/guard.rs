//! Run protected operations through the limiter.
//!
//! Semantics of [`AttemptGuard::run`]:
//! - The engine decides first. A denial returns [`GuardError::RateLimited`] without
//!   invoking the operation and without recording anything.
//! - Allowed attempts still running count against the key's allowance. Once they use
//!   it up, further callers wait for one to finish and are then checked again, so
//!   concurrent callers never run more attempts than the policy permits.
//! - On success the key's history is cleared and the value returned.
//! - On failure the failure is recorded and the operation's own error is returned
//!   unchanged inside [`GuardError::Inner`].
//! - Recording problems after the operation ran are logged, never surfaced: the caller
//!   always sees the operation's real outcome.
//!
//! Example
//! ```rust
//! use turnstile::AttemptGuard;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let guard = AttemptGuard::new();
//! let session = guard
//!     .login("a@example.com", || async { Ok::<_, std::io::Error>("session-token") })
//!     .await;
//! assert_eq!(session.unwrap(), "session-token");
//! # }
//! ```

use crate::admission::Admissions;
use crate::catalog::{PolicyCatalog, PolicyKind};
use crate::clock::{Clock, SystemClock};
use crate::engine::{Checked, Decision, RateLimitEngine};
use crate::error::{ceil_div, GuardError, RateLimitExceeded};
use crate::recorder::{AttemptRecorder, Recorded, StaleWindow};
use crate::store::{AttemptStore, InMemoryAttemptStore};
use crate::telemetry::{emit_best_effort, LimiterEvent, NullSink, TelemetrySink};
use crate::AttemptPolicy;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Answer to [`AttemptGuard::is_allowed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// The engine's full decision.
    pub decision: Decision,
    /// Human-readable explanation when denied.
    pub message: Option<String>,
}

/// Entry point for protected operations.
///
/// Clones share the store, clock, catalog and sink.
pub struct AttemptGuard<S = InMemoryAttemptStore, K = NullSink> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    engine: RateLimitEngine<S>,
    recorder: AttemptRecorder<S>,
    catalog: PolicyCatalog,
    admissions: Admissions,
    sink: K,
}

impl<S, K: Clone> Clone for AttemptGuard<S, K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            engine: self.engine.clone(),
            recorder: self.recorder.clone(),
            catalog: self.catalog.clone(),
            admissions: self.admissions.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<S: std::fmt::Debug, K: std::fmt::Debug> std::fmt::Debug for AttemptGuard<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptGuard")
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field("recorder", &self.recorder)
            .field("catalog", &self.catalog)
            .field("sink", &self.sink)
            .finish()
    }
}

impl AttemptGuard<InMemoryAttemptStore, NullSink> {
    /// Guard over a fresh in-memory store and the system clock.
    pub fn new() -> Self {
        Self::with_store(InMemoryAttemptStore::new())
    }
}

impl Default for AttemptGuard<InMemoryAttemptStore, NullSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AttemptStore> AttemptGuard<S, NullSink> {
    /// Guard over a caller-supplied store.
    pub fn with_store(store: S) -> Self {
        let store = Arc::new(store);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            engine: RateLimitEngine::new(store.clone(), clock.clone()),
            recorder: AttemptRecorder::new(store.clone(), clock.clone()),
            store,
            clock,
            catalog: PolicyCatalog::new(),
            admissions: Admissions::new(),
            sink: NullSink,
        }
    }
}

impl<S: AttemptStore, K> AttemptGuard<S, K> {
    /// Replace the time source.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        let stale_window = self.recorder.stale_window();
        self.engine = RateLimitEngine::new(self.store.clone(), self.clock.clone());
        self.recorder = AttemptRecorder::new(self.store.clone(), self.clock.clone())
            .with_stale_window(stale_window);
        self
    }

    /// Choose how failures treat a record whose window has elapsed.
    pub fn with_stale_window(mut self, stale_window: StaleWindow) -> Self {
        self.recorder = self.recorder.with_stale_window(stale_window);
        self
    }

    /// Use `catalog` for the convenience wrappers.
    pub fn with_catalog(mut self, catalog: PolicyCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Send limiter events to `sink`.
    pub fn with_sink<K2>(self, sink: K2) -> AttemptGuard<S, K2> {
        AttemptGuard {
            store: self.store,
            clock: self.clock,
            engine: self.engine,
            recorder: self.recorder,
            catalog: self.catalog,
            admissions: self.admissions,
            sink,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Live policies used by the convenience wrappers.
    pub fn catalog(&self) -> &PolicyCatalog {
        &self.catalog
    }

    /// The decision engine.
    pub fn engine(&self) -> &RateLimitEngine<S> {
        &self.engine
    }

    /// The outcome recorder.
    pub fn recorder(&self) -> &AttemptRecorder<S> {
        &self.recorder
    }
}

impl<S, K> AttemptGuard<S, K>
where
    S: AttemptStore,
    K: TelemetrySink + Sync,
    K::Future: Send + 'static,
{
    /// Run `operation` if `identifier` is currently allowed to attempt it.
    pub async fn run<T, E, Fut, Op>(
        &self,
        identifier: &str,
        policy: &AttemptPolicy,
        operation: &str,
        op: Op,
    ) -> Result<T, GuardError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        let key = policy.key_for(identifier, operation);
        let slot = self.admissions.slot(&key);
        let _reservation = loop {
            let gate = slot.enter().await;
            let checked = self.engine.check_key(&key, policy).await.map_err(GuardError::store)?;
            self.emit_purged(checked.purged).await;
            let in_flight = gate.in_flight();
            if matches!(checked.decision, Decision::Allowed { remaining, .. } if in_flight > remaining) {
                tracing::debug!(key = %key, in_flight, "allowance held by running attempts; waiting");
                gate.wait().await;
                continue;
            }
            self.emit_decision(&key, policy, &checked).await;
            if let Decision::Denied { retry_after, .. } = checked.decision {
                return Err(RateLimitExceeded::new(retry_after.as_secs(), operation).into());
            }
            break gate.reserve();
        };

        match op().await {
            Ok(value) => {
                match self.recorder.clear_key(&key).await {
                    Ok(Recorded::Cleared { existed: true }) => {
                        self.emit(LimiterEvent::Cleared { key }).await;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(key = %key, error = %e, "attempt history not cleared"),
                }
                Ok(value)
            }
            Err(err) => {
                match self.recorder.fail_key(&key, policy).await {
                    Ok(Recorded::Failure { attempts }) => {
                        self.emit(LimiterEvent::FailureRecorded { key, attempts }).await;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(key = %key, error = %e, "failed attempt not recorded"),
                }
                Err(GuardError::Inner(err))
            }
        }
    }

    /// Run `op` under the catalog's current policy for `kind`, labelled with the kind.
    pub async fn run_kind<T, E, Fut, Op>(
        &self,
        kind: PolicyKind,
        identifier: &str,
        op: Op,
    ) -> Result<T, GuardError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        let policy = self.catalog.get(kind);
        self.run(identifier, &policy, kind.label(), op).await
    }

    /// Login attempt, keyed by email.
    pub async fn login<T, E, Fut, Op>(&self, email: &str, op: Op) -> Result<T, GuardError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        self.run_kind(PolicyKind::Login, email, op).await
    }

    /// Registration attempt, keyed by email.
    pub async fn register<T, E, Fut, Op>(&self, email: &str, op: Op) -> Result<T, GuardError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        self.run_kind(PolicyKind::Registration, email, op).await
    }

    /// Password change, keyed by user id.
    pub async fn change_password<T, E, Fut, Op>(
        &self,
        user_id: &str,
        op: Op,
    ) -> Result<T, GuardError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        self.run_kind(PolicyKind::PasswordChange, user_id, op).await
    }

    /// Generic API call. Each endpoint is counted separately (`api:<endpoint>`).
    pub async fn api_call<T, E, Fut, Op>(
        &self,
        identifier: &str,
        endpoint: &str,
        op: Op,
    ) -> Result<T, GuardError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        let policy = self.catalog.get(PolicyKind::ApiGeneral);
        self.run(identifier, &policy, &format!("api:{}", endpoint), op).await
    }

    /// Sensitive administrative action (`sensitive:<action>`).
    pub async fn sensitive<T, E, Fut, Op>(
        &self,
        user_id: &str,
        action: &str,
        op: Op,
    ) -> Result<T, GuardError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        let policy = self.catalog.get(PolicyKind::SensitiveOperations);
        self.run(user_id, &policy, &format!("sensitive:{}", action), op).await
    }

    /// Ask the engine without running anything.
    ///
    /// Like any check this may start a block when the key is at its limit.
    pub async fn is_allowed(
        &self,
        identifier: &str,
        policy: &AttemptPolicy,
        operation: &str,
    ) -> Result<Permission, S::Error> {
        let decision = self.decision(identifier, policy, operation).await?;
        let message = decision.retry_after().map(|retry_after| {
            format!(
                "Too many {} attempts. Try again in {} minutes.",
                operation,
                ceil_div(retry_after.as_secs(), 60)
            )
        });
        Ok(Permission { allowed: decision.is_allowed(), decision, message })
    }

    /// [`AttemptGuard::is_allowed`] for a catalog policy.
    pub async fn is_kind_allowed(
        &self,
        kind: PolicyKind,
        identifier: &str,
    ) -> Result<Permission, S::Error> {
        let policy = self.catalog.get(kind);
        self.is_allowed(identifier, &policy, kind.label()).await
    }

    /// The raw engine decision, e.g. for `X-RateLimit-*` headers.
    pub async fn decision(
        &self,
        identifier: &str,
        policy: &AttemptPolicy,
        operation: &str,
    ) -> Result<Decision, S::Error> {
        let key = policy.key_for(identifier, operation);
        self.evaluate(&key, policy).await
    }

    /// Forget everything about the key, lifting any block. Returns whether a record
    /// existed.
    pub async fn reset(
        &self,
        identifier: &str,
        policy: &AttemptPolicy,
        operation: &str,
    ) -> Result<bool, S::Error> {
        let key = policy.key_for(identifier, operation);
        let existed = self.store.remove(&key).await?.is_some();
        tracing::info!(key = %key, existed, "attempt history reset");
        self.emit(LimiterEvent::Reset { key }).await;
        Ok(existed)
    }

    /// [`AttemptGuard::reset`] for a catalog policy.
    pub async fn reset_kind(&self, kind: PolicyKind, identifier: &str) -> Result<bool, S::Error> {
        let policy = self.catalog.get(kind);
        self.reset(identifier, &policy, kind.label()).await
    }

    /// Purge expired blocks every `every` until the returned task is aborted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_purger(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let guard = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
            loop {
                ticker.tick().await;
                match guard.engine.purge().await {
                    Ok(0) => {}
                    Ok(count) => {
                        tracing::debug!(count, "expired blocks purged");
                        guard.emit(LimiterEvent::Purged { count }).await;
                    }
                    Err(e) => tracing::warn!(error = %e, "purge failed"),
                }
            }
        })
    }

    async fn evaluate(&self, key: &str, policy: &AttemptPolicy) -> Result<Decision, S::Error> {
        let checked = self.engine.check_key(key, policy).await?;
        self.emit_purged(checked.purged).await;
        self.emit_decision(key, policy, &checked).await;
        Ok(checked.decision)
    }

    async fn emit_purged(&self, count: usize) {
        if count > 0 {
            self.emit(LimiterEvent::Purged { count }).await;
        }
    }

    async fn emit_decision(&self, key: &str, policy: &AttemptPolicy, checked: &Checked) {
        let key = key.to_string();
        let event = match (checked.decision, checked.blocked_at_attempts) {
            (Decision::Allowed { remaining, .. }, _) => LimiterEvent::Allowed { key, remaining },
            (Decision::Denied { .. }, Some(attempts)) => {
                LimiterEvent::Blocked { key, attempts, block: policy.block_duration() }
            }
            (Decision::Denied { retry_after, .. }, None) => LimiterEvent::Denied { key, retry_after },
        };
        self.emit(event).await;
    }

    async fn emit(&self, event: LimiterEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::telemetry::MemorySink;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn guard() -> (AttemptGuard<InMemoryAttemptStore, MemorySink>, ManualClock, MemorySink) {
        let clock = ManualClock::new(0);
        let sink = MemorySink::new();
        let guard = AttemptGuard::new().with_clock(clock.clone()).with_sink(sink.clone());
        (guard, clock, sink)
    }

    fn bad_password() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "bad password")
    }

    #[tokio::test]
    async fn success_returns_value_and_clears_history() {
        let (guard, _clock, _sink) = guard();
        let _ = guard.login("a@example.com", || async { Err::<(), _>(bad_password()) }).await;
        assert_eq!(guard.store().len(), 1);

        let value = guard.login("a@example.com", || async { Ok::<_, io::Error>(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(guard.store().is_empty());
    }

    #[tokio::test]
    async fn failure_is_rethrown_unchanged() {
        let (guard, _clock, _sink) = guard();
        let err = guard
            .login("a@example.com", || async { Err::<(), _>(bad_password()) })
            .await
            .unwrap_err();
        let inner = err.into_inner().unwrap();
        assert_eq!(inner.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(inner.to_string(), "bad password");
    }

    #[tokio::test]
    async fn denied_call_never_runs_the_operation() {
        let (guard, _clock, _sink) = guard();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let _ = guard.sensitive("admin", "delete_user", || async { Err::<(), _>(bad_password()) }).await;
        }

        let err = guard
            .sensitive("admin", "delete_user", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, io::Error>(())
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let denied = err.rate_limit().unwrap();
        assert_eq!(denied.retry_after(), Duration::from_secs(15 * 60));
        assert_eq!(denied.operation(), "sensitive:delete_user");
    }

    #[tokio::test]
    async fn wrappers_use_distinct_labels() {
        let (guard, _clock, _sink) = guard();
        let _ = guard.register("a@example.com", || async { Err::<(), _>(bad_password()) }).await;
        let _ = guard.change_password("u1", || async { Err::<(), _>(bad_password()) }).await;
        let _ = guard.api_call("u1", "orders", || async { Err::<(), _>(bad_password()) }).await;

        let mut keys: Vec<String> =
            guard.store().snapshot().await.unwrap().into_iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec!["api:orders:u1", "password_change:u1", "registration:a@example.com"]);
    }

    #[tokio::test]
    async fn is_allowed_explains_denials() {
        let (guard, _clock, _sink) = guard();
        let policy = AttemptPolicy::password_change();
        for _ in 0..3 {
            let _ = guard.run("u1", &policy, "password_change", || async { Err::<(), _>(bad_password()) }).await;
        }

        let permission = guard.is_allowed("u1", &policy, "password_change").await.unwrap();
        assert!(!permission.allowed);
        assert_eq!(
            permission.message.as_deref(),
            Some("Too many password_change attempts. Try again in 60 minutes.")
        );

        let other = guard.is_kind_allowed(PolicyKind::PasswordChange, "u2").await.unwrap();
        assert!(other.allowed);
        assert_eq!(other.message, None);
        assert_eq!(other.decision.remaining(), 2);
    }

    #[tokio::test]
    async fn reset_lifts_a_block_immediately() {
        let (guard, _clock, _sink) = guard();
        for _ in 0..5 {
            let _ = guard.login("a@example.com", || async { Err::<(), _>(bad_password()) }).await;
        }
        assert!(!guard.is_kind_allowed(PolicyKind::Login, "a@example.com").await.unwrap().allowed);

        assert!(guard.reset_kind(PolicyKind::Login, "a@example.com").await.unwrap());
        assert!(guard.is_kind_allowed(PolicyKind::Login, "a@example.com").await.unwrap().allowed);
        assert!(!guard.reset_kind(PolicyKind::Login, "a@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn catalog_overrides_apply_to_wrappers() {
        let (guard, _clock, _sink) = guard();
        guard.catalog().set(PolicyKind::Login, AttemptPolicy::from_millis(1, 60_000, 5_000));

        let _ = guard.login("a@example.com", || async { Err::<(), _>(bad_password()) }).await;
        let err = guard.login("a@example.com", || async { Ok::<_, io::Error>(()) }).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn events_trace_the_lifecycle() {
        let (guard, clock, sink) = guard();
        let policy = AttemptPolicy::from_millis(1, 60_000, 1_000);

        let _ = guard.run("a", &policy, "login", || async { Err::<(), _>(bad_password()) }).await;
        let _ = guard.run("a", &policy, "login", || async { Ok::<_, io::Error>(()) }).await;
        let _ = guard.run("a", &policy, "login", || async { Ok::<_, io::Error>(()) }).await;
        clock.advance(1_000);
        let _ = guard.run("a", &policy, "login", || async { Ok::<_, io::Error>(()) }).await;

        let key = "login:a".to_string();
        assert_eq!(
            sink.events(),
            vec![
                LimiterEvent::Allowed { key: key.clone(), remaining: 0 },
                LimiterEvent::FailureRecorded { key: key.clone(), attempts: 1 },
                LimiterEvent::Blocked { key: key.clone(), attempts: 1, block: Duration::from_secs(1) },
                LimiterEvent::Denied { key: key.clone(), retry_after: Duration::from_secs(1) },
                LimiterEvent::Purged { count: 1 },
                LimiterEvent::Allowed { key, remaining: 0 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn purger_sweeps_idle_blocks() {
        let (guard, clock, sink) = guard();
        let policy = AttemptPolicy::from_millis(0, 60_000, 1_000);
        assert!(!guard.is_allowed("a", &policy, "login").await.unwrap().allowed);
        assert_eq!(guard.store().len(), 1);
        sink.clear();

        clock.advance(1_000);
        let purger = guard.spawn_purger(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(10)).await;
        purger.abort();

        assert!(guard.store().is_empty());
        assert_eq!(sink.events(), vec![LimiterEvent::Purged { count: 1 }]);
    }

    async fn held_failure(
        guard: AttemptGuard<InMemoryAttemptStore, MemorySink>,
        policy: AttemptPolicy,
        release: Arc<tokio::sync::Semaphore>,
        calls: Arc<AtomicUsize>,
    ) -> Result<(), GuardError<io::Error>> {
        guard
            .run("a", &policy, "login", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let _permit = release.acquire().await;
                Err(bad_password())
            })
            .await
    }

    #[tokio::test]
    async fn running_attempts_use_up_the_allowance() {
        let (guard, _clock, sink) = guard();
        let policy = AttemptPolicy::from_millis(2, 60_000, 60_000);
        let release = Arc::new(tokio::sync::Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..3)
            .map(|_| tokio::spawn(held_failure(guard.clone(), policy.clone(), release.clone(), calls.clone())))
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2, "the third caller waits");

        release.add_permits(3);
        let mut limited = 0;
        for task in tasks {
            if task.await.unwrap().unwrap_err().is_rate_limited() {
                limited += 1;
            }
        }
        assert_eq!(limited, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(guard.store().get("login:a").await.unwrap().unwrap().attempts, 2);
        assert_eq!(sink.blocked_keys(), vec!["login:a".to_string()]);
        let recorded = sink
            .events_for("login:a")
            .into_iter()
            .filter(|event| matches!(event, LimiterEvent::FailureRecorded { .. }))
            .count();
        assert_eq!(recorded, 2);
    }

    #[tokio::test]
    async fn waiting_caller_runs_once_a_running_attempt_succeeds() {
        let (guard, _clock, _sink) = guard();
        let policy = AttemptPolicy::from_millis(1, 60_000, 60_000);
        let release = Arc::new(tokio::sync::Semaphore::new(0));

        let first = {
            let (guard, policy, release) = (guard.clone(), policy.clone(), release.clone());
            tokio::spawn(async move {
                guard
                    .run("a", &policy, "login", move || async move {
                        let _permit = release.acquire().await;
                        Ok::<_, io::Error>("first")
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = {
            let (guard, policy) = (guard.clone(), policy.clone());
            tokio::spawn(async move {
                guard.run("a", &policy, "login", || async { Ok::<_, io::Error>("second") }).await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!second.is_finished());

        release.add_permits(1);
        assert_eq!(first.await.unwrap().unwrap(), "first");
        assert_eq!(second.await.unwrap().unwrap(), "second");
        assert!(guard.store().is_empty());
    }

    #[tokio::test]
    async fn stale_window_mode_is_forwarded() {
        let (guard, _clock, _sink) = guard();
        let guard = guard.with_stale_window(StaleWindow::Carry);
        assert_eq!(guard.recorder().stale_window(), StaleWindow::Carry);

        let guard = guard.with_clock(ManualClock::new(0));
        assert_eq!(guard.recorder().stale_window(), StaleWindow::Carry);
    }
}
