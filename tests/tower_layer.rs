use std::time::Duration;
use tower::{ServiceBuilder, ServiceExt};
use turnstile::{
    classify, AttemptGuard, AttemptGuardLayer, AttemptPolicy, Identified, ManualClock, PolicyKind,
};

#[derive(Debug)]
struct SignIn {
    email: String,
    password: String,
}

impl SignIn {
    fn new(email: &str, password: &str) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl Identified for SignIn {
    fn identifier(&self) -> String {
        self.email.to_lowercase()
    }
}

#[derive(Debug, PartialEq)]
struct WrongPassword;

impl std::fmt::Display for WrongPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wrong password")
    }
}

impl std::error::Error for WrongPassword {}

async fn authenticate(req: SignIn) -> Result<String, WrongPassword> {
    if req.password == "correct horse" {
        Ok(format!("session-for-{}", req.email))
    } else {
        Err(WrongPassword)
    }
}

#[tokio::test]
async fn service_builder_stack_blocks_brute_force() {
    let clock = ManualClock::new(0);
    let guard = AttemptGuard::new().with_clock(clock.clone());
    let policy = guard.catalog().get(PolicyKind::Login);
    let svc = ServiceBuilder::new()
        .layer(AttemptGuardLayer::new(guard.clone(), policy, "login"))
        .service_fn(authenticate);

    for _ in 0..5 {
        let err = svc.clone().oneshot(SignIn::new("Bob@Example.com", "guess")).await.unwrap_err();
        assert_eq!(err.into_inner(), Some(WrongPassword));
    }

    // Identifier normalisation means a case change does not dodge the block.
    let err = svc
        .clone()
        .oneshot(SignIn::new("BOB@example.com", "correct horse"))
        .await
        .unwrap_err();
    assert!(classify::is_rate_limit_error(&err));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(1800)));

    clock.advance(30 * 60_000);
    let session = svc.oneshot(SignIn::new("bob@example.com", "correct horse")).await.unwrap();
    assert_eq!(session, "session-for-bob@example.com");
    assert!(guard.store().is_empty(), "success clears the history");
}

#[tokio::test]
async fn layer_respects_custom_key_generators() {
    let guard = AttemptGuard::new().with_clock(ManualClock::new(0));
    let policy = AttemptPolicy::from_millis(1, 60_000, 60_000).with_key_generator(|_| "everyone".into());
    let svc = ServiceBuilder::new()
        .layer(AttemptGuardLayer::new(guard.clone(), policy, "login"))
        .service_fn(authenticate);

    let _ = svc.clone().oneshot(SignIn::new("a@example.com", "guess")).await;
    let err = svc.oneshot(SignIn::new("b@example.com", "correct horse")).await.unwrap_err();
    assert!(err.is_rate_limited());
}
