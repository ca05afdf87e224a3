//! Identity provider bridge.
//!
//! Third-party sign-in is performed by an external collaborator behind the
//! [`IdentityProvider`] trait: it owns the account sessions and yields an
//! account + token pair from a popup or redirect sign-in. The orchestrator
//! only ever references accounts, it never stores them itself.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

pub mod browser;

/// Session marker the provider library leaves behind when an interaction is
/// in flight. Cleared before every popup sign-in; a stale marker from an
/// interrupted attempt otherwise blocks the next one.
pub const INTERACTION_STATUS_MARKER: &str = "msal.interaction.status";

/// An account session issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub id_token: String,
}

/// Surface of the external identity provider the login flow consumes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// All accounts the provider has persisted, across page reloads.
    fn accounts(&self) -> Vec<Account>;

    /// The currently active account, if one was activated.
    fn active_account(&self) -> Option<Account>;

    /// Marks an account as the active one.
    fn set_active_account(&self, account: &Account);

    /// Interactive popup sign-in. Suspends for a user-controlled duration.
    async fn login_popup(&self) -> Result<Account>;

    /// Redirect-style sign-in, for contexts where a popup is unavailable.
    async fn login_redirect(&self) -> Result<Account>;

    /// Signs out via popup, keeping the current surface alive.
    async fn logout_popup(&self) -> Result<()>;

    /// Signs out via full redirect.
    async fn logout_redirect(&self) -> Result<()>;
}

/// Session-scoped marker storage, injected instead of read from ambient
/// globals so the orchestrator stays testable.
pub trait SessionMarkerStore: Send {
    fn set(&mut self, key: &str, value: &str);
    fn get(&self, key: &str) -> Option<String>;
    fn clear(&mut self, key: &str);
}

/// In-memory marker store; one per session.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    markers: HashMap<String, String>,
}

impl SessionMarkerStore for MemorySessionStore {
    fn set(&mut self, key: &str, value: &str) {
        self.markers.insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<String> {
        self.markers.get(key).cloned()
    }

    fn clear(&mut self, key: &str) {
        self.markers.remove(key);
    }
}

/// Provider stub used when no identity provider is configured. Reports no
/// accounts and refuses interactive sign-in.
#[derive(Debug, Default)]
pub struct UnconfiguredProvider;

#[async_trait]
impl IdentityProvider for UnconfiguredProvider {
    fn accounts(&self) -> Vec<Account> {
        Vec::new()
    }

    fn active_account(&self) -> Option<Account> {
        None
    }

    fn set_active_account(&self, _account: &Account) {}

    async fn login_popup(&self) -> Result<Account> {
        anyhow::bail!("No identity provider is configured")
    }

    async fn login_redirect(&self) -> Result<Account> {
        anyhow::bail!("No identity provider is configured")
    }

    async fn logout_popup(&self) -> Result<()> {
        anyhow::bail!("No identity provider is configured")
    }

    async fn logout_redirect(&self) -> Result<()> {
        anyhow::bail!("No identity provider is configured")
    }
}
