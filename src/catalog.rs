//! Named attempt policies.
//!
//! ## Available Presets
//!
//! | Kind | Max failures | Window | Block |
//! |---|---|---|---|
//! | [`PolicyKind::Login`] | 5 | 15 min | 30 min |
//! | [`PolicyKind::Registration`] | 3 | 60 min | 120 min |
//! | [`PolicyKind::PasswordChange`] | 3 | 10 min | 60 min |
//! | [`PolicyKind::ApiGeneral`] | 100 | 1 min | 5 min |
//! | [`PolicyKind::SensitiveOperations`] | 2 | 5 min | 15 min |
//!
//! [`PolicyCatalog`] holds one live copy of each preset. Operators can swap a policy at
//! runtime (e.g. tighten login during an attack) and every guard sharing the catalog
//! picks it up on the next decision.
//!
//! ```rust
//! use std::time::Duration;
//! use turnstile::{AttemptPolicy, PolicyCatalog, PolicyKind};
//!
//! let catalog = PolicyCatalog::new();
//! assert_eq!(catalog.get(PolicyKind::Login).max_attempts(), 5);
//!
//! catalog.set(PolicyKind::Login, AttemptPolicy::new(2, Duration::from_secs(60), Duration::from_secs(600)).unwrap());
//! assert_eq!(catalog.get(PolicyKind::Login).max_attempts(), 2);
//!
//! catalog.reset_to_default(PolicyKind::Login);
//! assert_eq!(catalog.get(PolicyKind::Login), AttemptPolicy::login());
//! ```

use crate::AttemptPolicy;
use arc_swap::ArcSwap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const MINUTE_MILLIS: u64 = 60 * 1_000;

const LOGIN_MAX_ATTEMPTS: u32 = 5;
const LOGIN_WINDOW_MILLIS: u64 = 15 * MINUTE_MILLIS;
const LOGIN_BLOCK_MILLIS: u64 = 30 * MINUTE_MILLIS;

const REGISTRATION_MAX_ATTEMPTS: u32 = 3;
const REGISTRATION_WINDOW_MILLIS: u64 = 60 * MINUTE_MILLIS;
const REGISTRATION_BLOCK_MILLIS: u64 = 120 * MINUTE_MILLIS;

const PASSWORD_CHANGE_MAX_ATTEMPTS: u32 = 3;
const PASSWORD_CHANGE_WINDOW_MILLIS: u64 = 10 * MINUTE_MILLIS;
const PASSWORD_CHANGE_BLOCK_MILLIS: u64 = 60 * MINUTE_MILLIS;

const API_GENERAL_MAX_ATTEMPTS: u32 = 100;
const API_GENERAL_WINDOW_MILLIS: u64 = MINUTE_MILLIS;
const API_GENERAL_BLOCK_MILLIS: u64 = 5 * MINUTE_MILLIS;

const SENSITIVE_MAX_ATTEMPTS: u32 = 2;
const SENSITIVE_WINDOW_MILLIS: u64 = 5 * MINUTE_MILLIS;
const SENSITIVE_BLOCK_MILLIS: u64 = 15 * MINUTE_MILLIS;

impl AttemptPolicy {
    /// Credential checks: 5 failures per 15 minutes, then a 30 minute block.
    pub const fn login() -> Self {
        Self::from_millis(LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW_MILLIS, LOGIN_BLOCK_MILLIS)
    }

    /// Account creation: 3 failures per hour, then a 2 hour block.
    pub const fn registration() -> Self {
        Self::from_millis(
            REGISTRATION_MAX_ATTEMPTS,
            REGISTRATION_WINDOW_MILLIS,
            REGISTRATION_BLOCK_MILLIS,
        )
    }

    /// Password updates: 3 failures per 10 minutes, then a 1 hour block.
    pub const fn password_change() -> Self {
        Self::from_millis(
            PASSWORD_CHANGE_MAX_ATTEMPTS,
            PASSWORD_CHANGE_WINDOW_MILLIS,
            PASSWORD_CHANGE_BLOCK_MILLIS,
        )
    }

    /// Generic API traffic: 100 failures per minute, then a 5 minute block.
    pub const fn api_general() -> Self {
        Self::from_millis(API_GENERAL_MAX_ATTEMPTS, API_GENERAL_WINDOW_MILLIS, API_GENERAL_BLOCK_MILLIS)
    }

    /// Administrative operations: 2 failures per 5 minutes, then a 15 minute block.
    pub const fn sensitive_operations() -> Self {
        Self::from_millis(SENSITIVE_MAX_ATTEMPTS, SENSITIVE_WINDOW_MILLIS, SENSITIVE_BLOCK_MILLIS)
    }
}

/// The operation classes with a preset policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PolicyKind {
    /// Sign-in attempts.
    Login,
    /// Account creation.
    Registration,
    /// Password updates.
    PasswordChange,
    /// General API calls.
    ApiGeneral,
    /// Administrative / destructive operations.
    SensitiveOperations,
}

impl PolicyKind {
    /// Every kind, in catalog order.
    pub const ALL: [PolicyKind; 5] = [
        PolicyKind::Login,
        PolicyKind::Registration,
        PolicyKind::PasswordChange,
        PolicyKind::ApiGeneral,
        PolicyKind::SensitiveOperations,
    ];

    /// The preset values for this kind.
    pub const fn policy(self) -> AttemptPolicy {
        match self {
            PolicyKind::Login => AttemptPolicy::login(),
            PolicyKind::Registration => AttemptPolicy::registration(),
            PolicyKind::PasswordChange => AttemptPolicy::password_change(),
            PolicyKind::ApiGeneral => AttemptPolicy::api_general(),
            PolicyKind::SensitiveOperations => AttemptPolicy::sensitive_operations(),
        }
    }

    /// Operation label used for key derivation and messages.
    pub const fn label(self) -> &'static str {
        match self {
            PolicyKind::Login => "login",
            PolicyKind::Registration => "registration",
            PolicyKind::PasswordChange => "password_change",
            PolicyKind::ApiGeneral => "api_general",
            PolicyKind::SensitiveOperations => "sensitive_operations",
        }
    }

    fn index(self) -> usize {
        match self {
            PolicyKind::Login => 0,
            PolicyKind::Registration => 1,
            PolicyKind::PasswordChange => 2,
            PolicyKind::ApiGeneral => 3,
            PolicyKind::SensitiveOperations => 4,
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a string names no known policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown policy kind '{0}'")]
pub struct UnknownPolicyKind(pub String);

impl FromStr for PolicyKind {
    type Err = UnknownPolicyKind;

    /// Accepts `LOGIN`, `login`, `PASSWORD_CHANGE`, `password-change`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        PolicyKind::ALL
            .into_iter()
            .find(|kind| kind.label() == normalized)
            .ok_or_else(|| UnknownPolicyKind(s.to_string()))
    }
}

/// Live, swappable set of the preset policies.
///
/// Clones share the same slots. Reads are lock-free.
#[derive(Debug, Clone)]
pub struct PolicyCatalog {
    slots: Arc<[ArcSwap<AttemptPolicy>; 5]>,
}

impl PolicyCatalog {
    /// Catalog holding the preset values.
    pub fn new() -> Self {
        let slots = PolicyKind::ALL.map(|kind| ArcSwap::from_pointee(kind.policy()));
        Self { slots: Arc::new(slots) }
    }

    /// Snapshot the current policy for `kind`.
    pub fn get(&self, kind: PolicyKind) -> AttemptPolicy {
        AttemptPolicy::clone(&self.slots[kind.index()].load())
    }

    /// Replace the policy for `kind`.
    pub fn set(&self, kind: PolicyKind, policy: AttemptPolicy) {
        tracing::info!(
            kind = %kind,
            max_attempts = policy.max_attempts(),
            window_ms = policy.window_millis(),
            block_ms = policy.block_millis(),
            "attempt policy replaced"
        );
        self.slots[kind.index()].store(Arc::new(policy));
    }

    /// Restore the preset for `kind`.
    pub fn reset_to_default(&self, kind: PolicyKind) {
        self.slots[kind.index()].store(Arc::new(kind.policy()));
    }

    /// Install a policy loaded from configuration.
    #[cfg(feature = "serde")]
    pub fn apply(&self, kind: PolicyKind, config: crate::policy::PolicyConfig) {
        self.set(kind, config.into());
    }

    /// Install every entry of a configuration map.
    #[cfg(feature = "serde")]
    pub fn apply_all<I>(&self, overrides: I)
    where
        I: IntoIterator<Item = (PolicyKind, crate::policy::PolicyConfig)>,
    {
        for (kind, config) in overrides {
            self.apply(kind, config);
        }
    }
}

impl Default for PolicyCatalog {
    fn default() -> Self {
        Self::new()
    }
}
