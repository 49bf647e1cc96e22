//! Tower integration: run every request of a service through an [`AttemptGuard`].
//!
//! The request type names who is attempting via [`Identified`]. A denied request never
//! reaches the inner service; inner errors count as failures and come back unchanged
//! inside [`GuardError::Inner`].

use crate::error::GuardError;
use crate::guard::AttemptGuard;
use crate::store::AttemptStore;
use crate::telemetry::TelemetrySink;
use crate::AttemptPolicy;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Requests that carry the identifier attempts are counted against.
pub trait Identified {
    /// Email, user id, client address, ...
    fn identifier(&self) -> String;
}

/// A layer that counts failed calls per identifier and blocks abusive callers.
pub struct AttemptGuardLayer<S, K> {
    guard: AttemptGuard<S, K>,
    policy: AttemptPolicy,
    operation: Arc<str>,
}

impl<S, K> AttemptGuardLayer<S, K> {
    /// Guard every call with `policy`, counting under the `operation` label.
    pub fn new(guard: AttemptGuard<S, K>, policy: AttemptPolicy, operation: impl Into<Arc<str>>) -> Self {
        Self { guard, policy, operation: operation.into() }
    }
}

impl<S, K: Clone> Clone for AttemptGuardLayer<S, K> {
    fn clone(&self) -> Self {
        Self { guard: self.guard.clone(), policy: self.policy.clone(), operation: self.operation.clone() }
    }
}

impl<Svc, S, K: Clone> Layer<Svc> for AttemptGuardLayer<S, K> {
    type Service = AttemptGuardService<Svc, S, K>;

    fn layer(&self, service: Svc) -> Self::Service {
        AttemptGuardService {
            inner: service,
            guard: self.guard.clone(),
            policy: self.policy.clone(),
            operation: self.operation.clone(),
        }
    }
}

/// Middleware service produced by [`AttemptGuardLayer`].
pub struct AttemptGuardService<Svc, S, K> {
    inner: Svc,
    guard: AttemptGuard<S, K>,
    policy: AttemptPolicy,
    operation: Arc<str>,
}

impl<Svc: Clone, S, K: Clone> Clone for AttemptGuardService<Svc, S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            guard: self.guard.clone(),
            policy: self.policy.clone(),
            operation: self.operation.clone(),
        }
    }
}

impl<Svc, S, K, Req> Service<Req> for AttemptGuardService<Svc, S, K>
where
    Svc: Service<Req> + Clone + Send + 'static,
    Svc::Response: Send,
    Svc::Future: Send + 'static,
    Svc::Error: Send,
    S: AttemptStore,
    K: TelemetrySink + Sync,
    K::Future: Send + 'static,
    Req: Identified + Send + 'static,
{
    type Response = Svc::Response;
    type Error = GuardError<Svc::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GuardError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let guard = self.guard.clone();
        let policy = self.policy.clone();
        let operation = self.operation.clone();

        Box::pin(async move {
            let identifier = req.identifier();
            guard.run(&identifier, &policy, &operation, move || inner.call(req)).await
        })
    }
}
