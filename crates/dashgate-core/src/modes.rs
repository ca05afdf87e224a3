//! Authentication modes and the registry tracking them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cookies::{AUTH_MODE_COOKIE, CookieJar};

/// One of the mutually exclusive credential-entry strategies the login
/// surface supports.
///
/// The first three come from the backend; `AzureAd` is injected client-side
/// for identity-provider sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationMode {
    #[serde(rename = "kubeconfig")]
    Kubeconfig,
    #[serde(rename = "basic")]
    Basic,
    #[serde(rename = "token")]
    Token,
    #[serde(rename = "AzureAD")]
    AzureAd,
}

impl AuthenticationMode {
    /// The wire name the backend and the persistence cookie use.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthenticationMode::Kubeconfig => "kubeconfig",
            AuthenticationMode::Basic => "basic",
            AuthenticationMode::Token => "token",
            AuthenticationMode::AzureAd => "AzureAD",
        }
    }

    /// Parses a wire name back into a mode.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kubeconfig" => Some(AuthenticationMode::Kubeconfig),
            "basic" => Some(AuthenticationMode::Basic),
            "token" => Some(AuthenticationMode::Token),
            "AzureAD" => Some(AuthenticationMode::AzureAd),
            _ => None,
        }
    }
}

impl fmt::Display for AuthenticationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks which authentication modes are enabled and which one is selected.
#[derive(Debug, Default)]
pub struct ModeRegistry {
    enabled: Vec<AuthenticationMode>,
    selected: Option<AuthenticationMode>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the backend's enabled-mode list.
    ///
    /// Inherited behavior: the identity-provider mode is appended and the
    /// list's first entry is then removed unconditionally. Whatever mode the
    /// backend happened to put first is discarded, not specifically the one
    /// being replaced.
    pub fn apply_backend_modes(&mut self, modes: Vec<AuthenticationMode>) {
        self.enabled = modes;
        self.enabled.push(AuthenticationMode::AzureAd);
        self.enabled.remove(0);
    }

    /// Restores the selection persisted by a previous session, unless a
    /// selection was already made.
    pub fn restore_selection(&mut self, cookies: &dyn CookieJar) {
        if self.selected.is_some() {
            return;
        }
        self.selected = cookies
            .get(AUTH_MODE_COOKIE)
            .as_deref()
            .and_then(AuthenticationMode::parse);
    }

    /// Sets the selected mode. Not validated against the enabled list.
    pub fn select(&mut self, mode: AuthenticationMode) {
        self.selected = Some(mode);
    }

    pub fn selected(&self) -> Option<AuthenticationMode> {
        self.selected
    }

    pub fn enabled(&self) -> &[AuthenticationMode] {
        &self.enabled
    }
}
