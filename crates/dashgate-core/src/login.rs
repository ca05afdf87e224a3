//! The login orchestrator.
//!
//! Drives one login attempt end to end: validates captured credentials,
//! persists the mode choice, dispatches by mode (backend login endpoint or
//! identity-provider sign-in), interprets the result and resolves the
//! post-login navigation target. Collaborators are injected at construction;
//! nothing is read from ambient globals.

use anyhow::Result;
use async_trait::async_trait;

use crate::bridge::{IdentityProvider, INTERACTION_STATUS_MARKER, SessionMarkerStore};
use crate::client::DashboardClient;
use crate::cookies::{AUTH_MODE_COOKIE, CookieJar, SKIP_LOGIN_COOKIE, SameSite};
use crate::credentials::{CredentialCapture, CredentialInput};
use crate::error::{AuthError, K8sError};
use crate::history::{DEFAULT_LANDING_ROUTE, Navigator};
use crate::modes::{AuthenticationMode, ModeRegistry};

/// Query parameter on the login route that, combined with a skippable
/// backend, bypasses login automatically.
pub const SKIP_LOGIN_QUERY_PARAM: &str = "skipLoginPage";

/// Dependent subsystem reloaded after every successful backend login.
#[async_trait]
pub trait PluginConfigService: Send {
    async fn refresh_config(&mut self) -> Result<()>;
}

/// Plugin-config reload backed by the dashboard API.
pub struct HttpPluginConfig {
    client: DashboardClient,
}

impl HttpPluginConfig {
    pub fn new(client: DashboardClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginConfigService for HttpPluginConfig {
    async fn refresh_config(&mut self) -> Result<()> {
        self.client.refresh_plugin_config().await
    }
}

/// How the user arrived at the login screen.
#[derive(Debug, Default)]
pub struct NavigationContext {
    /// Value of the [`SKIP_LOGIN_QUERY_PARAM`] query parameter, if present.
    pub skip_query_param: Option<String>,
    /// Error payload carried by the navigation (e.g. a failed authenticated
    /// request elsewhere redirected here). Shown before any interaction.
    pub error: Option<AuthError>,
}

/// Result of a login attempt or skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Login succeeded (or was skipped); carries the resolved route.
    NavigatedTo(String),
    /// Login halted; the errors are on [`LoginOrchestrator::errors`].
    Halted,
}

/// Everything the orchestrator talks to, provided rather than constructed.
pub struct LoginCollaborators {
    pub client: DashboardClient,
    pub provider: Box<dyn IdentityProvider>,
    pub cookies: Box<dyn CookieJar>,
    pub session: Box<dyn SessionMarkerStore>,
    pub navigator: Box<dyn Navigator>,
    pub plugins: Box<dyn PluginConfigService>,
    /// Whether the surface runs embedded (iframe-like context); popup
    /// sign-in is unavailable there.
    pub is_embedded: bool,
}

/// State machine over the selected authentication mode.
pub struct LoginOrchestrator {
    client: DashboardClient,
    provider: Box<dyn IdentityProvider>,
    cookies: Box<dyn CookieJar>,
    session: Box<dyn SessionMarkerStore>,
    navigator: Box<dyn Navigator>,
    plugins: Box<dyn PluginConfigService>,
    is_embedded: bool,

    registry: ModeRegistry,
    capture: CredentialCapture,
    errors: Vec<AuthError>,
    login_skippable: bool,
}

impl LoginOrchestrator {
    pub fn new(collaborators: LoginCollaborators) -> Self {
        Self {
            client: collaborators.client,
            provider: collaborators.provider,
            cookies: collaborators.cookies,
            session: collaborators.session,
            navigator: collaborators.navigator,
            plugins: collaborators.plugins,
            is_embedded: collaborators.is_embedded,
            registry: ModeRegistry::new(),
            capture: CredentialCapture::default(),
            errors: Vec::new(),
            login_skippable: false,
        }
    }

    /// Initializes the screen state.
    ///
    /// Surfaces a navigation-carried error, restores the persisted mode
    /// selection, fetches enabled modes and the skippable flag (independent
    /// requests, each applied when it arrives), and checks the provider for
    /// an already-signed-in account. May resolve immediately: an existing
    /// provider account logs straight in, and a skippable backend combined
    /// with the literal query value `"true"` bypasses login.
    pub async fn initialize(&mut self, ctx: NavigationContext) -> Option<LoginOutcome> {
        if let Some(error) = ctx.error {
            self.errors = vec![error];
        }

        self.registry.restore_selection(self.cookies.as_ref());

        let (modes, skippable) = tokio::join!(
            self.client.enabled_modes(),
            self.client.login_skippable()
        );
        match modes {
            Ok(modes) => self.registry.apply_backend_modes(modes),
            Err(err) => tracing::warn!("failed to fetch enabled login modes: {err:#}"),
        }
        match skippable {
            Ok(skippable) => self.login_skippable = skippable,
            Err(err) => tracing::warn!("failed to fetch login skippable flag: {err:#}"),
        }

        if !self.provider.accounts().is_empty() {
            self.check_and_set_active_account();
            if let Some(account) = self.provider.active_account() {
                match self
                    .client
                    .accept_provider_credentials(&account.username, &account.id_token)
                    .await
                {
                    Ok(()) => return Some(self.navigate()),
                    Err(err) => self.errors = vec![AuthError::from_transport(&err)],
                }
            }
        }

        let auto_skip = ctx.skip_query_param.as_deref() == Some("true");
        if self.login_skippable && auto_skip {
            return Some(self.skip());
        }

        None
    }

    /// Activates the first account when accounts exist but none is active.
    fn check_and_set_active_account(&mut self) {
        if self.provider.active_account().is_none() {
            let accounts = self.provider.accounts();
            if let Some(first) = accounts.first() {
                self.provider.set_active_account(first);
            }
        }
    }

    /// Sets the selected mode; no validation against the enabled list.
    pub fn select_mode(&mut self, mode: AuthenticationMode) {
        self.registry.select(mode);
    }

    /// Routes raw input into the capture slot for the selected mode.
    /// Ignored while no mode is selected.
    pub fn on_input(&mut self, input: &CredentialInput) {
        if let Some(mode) = self.registry.selected() {
            self.capture.record(mode, input);
        }
    }

    /// Runs one login attempt.
    pub async fn login(&mut self) -> LoginOutcome {
        self.errors.clear();

        // Local validation, before any side effect or network call.
        if self.registry.selected() == Some(AuthenticationMode::Token)
            && self.capture.has_empty_token()
        {
            self.errors = vec![AuthError::bad_request("Empty token provided")];
            return LoginOutcome::Halted;
        }

        self.save_last_login_mode();

        if self.registry.selected() == Some(AuthenticationMode::AzureAd) {
            self.login_via_provider().await
        } else {
            self.login_via_backend().await
        }
    }

    /// Persists the mode choice, once per attempt, before the outcome is
    /// known.
    fn save_last_login_mode(&mut self) {
        let mode = self
            .registry
            .selected()
            .map_or("", AuthenticationMode::as_str);
        self.cookies.set(AUTH_MODE_COOKIE, mode, SameSite::Strict);
    }

    async fn login_via_provider(&mut self) -> LoginOutcome {
        if self.is_embedded {
            self.errors = vec![AuthError::bad_request(
                "Popup sign-in is unavailable in an embedded context",
            )];
            return LoginOutcome::Halted;
        }

        // A stale marker from an interrupted provider interaction blocks the
        // next popup; reset it unconditionally.
        self.session.clear(INTERACTION_STATUS_MARKER);

        let account = match self.provider.login_popup().await {
            Ok(account) => account,
            Err(err) => {
                self.errors = vec![AuthError::from_provider(&err)];
                return LoginOutcome::Halted;
            }
        };

        // Activation must complete before the backend is notified.
        self.provider.set_active_account(&account);

        match self
            .client
            .accept_provider_credentials(&account.username, &account.id_token)
            .await
        {
            Ok(()) => self.navigate(),
            Err(err) => {
                self.errors = vec![AuthError::from_transport(&err)];
                LoginOutcome::Halted
            }
        }
    }

    async fn login_via_backend(&mut self) -> LoginOutcome {
        let spec = self.capture.login_spec(self.registry.selected());

        let response = match self.client.login(&spec).await {
            Ok(response) => response,
            Err(err) => {
                self.errors = vec![AuthError::from_transport(&err)];
                return LoginOutcome::Halted;
            }
        };

        if !response.errors.is_empty() {
            self.errors = response.errors.iter().map(K8sError::to_auth_error).collect();
            return LoginOutcome::Halted;
        }

        if let Err(err) = self.plugins.refresh_config().await {
            tracing::warn!("plugin config refresh failed: {err:#}");
        }
        self.navigate()
    }

    /// Bypasses login explicitly. Marks the session as having skipped login
    /// and returns to the previous state. Only reachable when
    /// [`Self::is_skip_enabled`] is true.
    pub fn skip(&mut self) -> LoginOutcome {
        self.cookies.set(SKIP_LOGIN_COOKIE, "true", SameSite::Strict);
        self.navigate()
    }

    fn navigate(&mut self) -> LoginOutcome {
        LoginOutcome::NavigatedTo(self.navigator.go_to_previous_state(DEFAULT_LANDING_ROUTE))
    }

    pub fn is_skip_enabled(&self) -> bool {
        self.login_skippable
    }

    pub fn enabled_modes(&self) -> &[AuthenticationMode] {
        self.registry.enabled()
    }

    pub fn selected_mode(&self) -> Option<AuthenticationMode> {
        self.registry.selected()
    }

    /// Errors surfaced by the last attempt (or carried by navigation).
    pub fn errors(&self) -> &[AuthError] {
        &self.errors
    }

    /// Signs out through the identity provider.
    pub async fn logout(&mut self, popup: bool) -> Result<()> {
        if popup {
            self.provider.logout_popup().await
        } else {
            self.provider.logout_redirect().await
        }
    }
}
