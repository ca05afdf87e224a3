//! End-to-end tests for the login orchestrator against a mock backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dashgate_core::bridge::{
    Account, IdentityProvider, INTERACTION_STATUS_MARKER, SessionMarkerStore,
};
use dashgate_core::client::DashboardClient;
use dashgate_core::cookies::{AUTH_MODE_COOKIE, CookieJar, SKIP_LOGIN_COOKIE, SameSite};
use dashgate_core::credentials::CredentialInput;
use dashgate_core::history::History;
use dashgate_core::login::{
    LoginCollaborators, LoginOrchestrator, LoginOutcome, NavigationContext, PluginConfigService,
};
use dashgate_core::modes::AuthenticationMode;

/// Cookie jar with a shared handle so tests can inspect writes afterwards.
#[derive(Clone, Default)]
struct SharedJar {
    inner: Arc<Mutex<JarState>>,
}

#[derive(Default)]
struct JarState {
    cookies: HashMap<String, String>,
    writes: Vec<String>,
}

impl SharedJar {
    fn value(&self, name: &str) -> Option<String> {
        self.inner.lock().unwrap().cookies.get(name).cloned()
    }

    fn write_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|w| w.as_str() == name)
            .count()
    }
}

impl CookieJar for SharedJar {
    fn get(&self, name: &str) -> Option<String> {
        self.value(name)
    }

    fn set(&mut self, name: &str, value: &str, _same_site: SameSite) {
        let mut state = self.inner.lock().unwrap();
        state.cookies.insert(name.to_string(), value.to_string());
        state.writes.push(name.to_string());
    }
}

#[derive(Clone, Default)]
struct SharedSession {
    markers: Arc<Mutex<HashMap<String, String>>>,
}

impl SessionMarkerStore for SharedSession {
    fn set(&mut self, key: &str, value: &str) {
        self.markers
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<String> {
        self.markers.lock().unwrap().get(key).cloned()
    }

    fn clear(&mut self, key: &str) {
        self.markers.lock().unwrap().remove(key);
    }
}

#[derive(Clone, Default)]
struct CountingPlugins {
    refreshes: Arc<AtomicUsize>,
}

#[async_trait]
impl PluginConfigService for CountingPlugins {
    async fn refresh_config(&mut self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted identity provider.
#[derive(Clone, Default)]
struct FakeProvider {
    inner: Arc<Mutex<FakeProviderState>>,
}

#[derive(Default)]
struct FakeProviderState {
    accounts: Vec<Account>,
    active: Option<Account>,
    popup_result: Option<Account>,
}

impl FakeProvider {
    fn with_popup_account(account: Account) -> Self {
        let provider = Self::default();
        provider.inner.lock().unwrap().popup_result = Some(account);
        provider
    }

    fn with_existing_account(account: Account) -> Self {
        let provider = Self::default();
        provider.inner.lock().unwrap().accounts.push(account);
        provider
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn accounts(&self) -> Vec<Account> {
        self.inner.lock().unwrap().accounts.clone()
    }

    fn active_account(&self) -> Option<Account> {
        self.inner.lock().unwrap().active.clone()
    }

    fn set_active_account(&self, account: &Account) {
        self.inner.lock().unwrap().active = Some(account.clone());
    }

    async fn login_popup(&self) -> Result<Account> {
        let mut state = self.inner.lock().unwrap();
        match state.popup_result.clone() {
            Some(account) => {
                state.accounts.push(account.clone());
                Ok(account)
            }
            None => anyhow::bail!("user closed the popup"),
        }
    }

    async fn login_redirect(&self) -> Result<Account> {
        self.login_popup().await
    }

    async fn logout_popup(&self) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.accounts.clear();
        state.active = None;
        Ok(())
    }

    async fn logout_redirect(&self) -> Result<()> {
        self.logout_popup().await
    }
}

struct Harness {
    jar: SharedJar,
    session: SharedSession,
    plugins: CountingPlugins,
    provider: FakeProvider,
}

fn orchestrator(server: &MockServer, provider: FakeProvider) -> (LoginOrchestrator, Harness) {
    let harness = Harness {
        jar: SharedJar::default(),
        session: SharedSession::default(),
        plugins: CountingPlugins::default(),
        provider: provider.clone(),
    };

    let mut history = History::new();
    history.record("pods");

    let orchestrator = LoginOrchestrator::new(LoginCollaborators {
        client: DashboardClient::new(server.uri()),
        provider: Box::new(provider),
        cookies: Box::new(harness.jar.clone()),
        session: Box::new(harness.session.clone()),
        navigator: Box::new(history),
        plugins: Box::new(harness.plugins.clone()),
        is_embedded: false,
    });

    (orchestrator, harness)
}

fn token_input(value: &str) -> CredentialInput {
    CredentialInput::Field {
        id: "token".to_string(),
        value: value.to_string(),
    }
}

#[tokio::test]
async fn test_empty_token_rejected_locally_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (mut login, harness) = orchestrator(&server, FakeProvider::default());
    login.select_mode(AuthenticationMode::Token);
    login.on_input(&token_input("   "));

    assert_eq!(login.login().await, LoginOutcome::Halted);

    let errors = login.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, 400);
    assert_eq!(errors[0].message, "Empty token provided");

    // Local rejection: no cookie write, no plugin refresh either.
    assert_eq!(harness.jar.write_count(AUTH_MODE_COOKIE), 0);
    assert_eq!(harness.plugins.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_token_login_success_refreshes_plugins_then_navigates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .and(body_json(serde_json::json!({"token": "secret-token"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"jweToken": "jwe", "errors": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (mut login, harness) = orchestrator(&server, FakeProvider::default());
    login.select_mode(AuthenticationMode::Token);
    login.on_input(&token_input("  secret-token  "));

    assert_eq!(
        login.login().await,
        LoginOutcome::NavigatedTo("pods".to_string())
    );
    assert!(login.errors().is_empty());
    assert_eq!(harness.plugins.refreshes.load(Ordering::SeqCst), 1);

    // Mode cookie written exactly once, with the submitted mode.
    assert_eq!(harness.jar.write_count(AUTH_MODE_COOKIE), 1);
    assert_eq!(harness.jar.value(AUTH_MODE_COOKIE).as_deref(), Some("token"));
}

#[tokio::test]
async fn test_backend_rejection_translates_errors_and_halts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errors": [
                {"ErrStatus": {"message": "MSG_LOGIN_UNAUTHORIZED_ERROR", "code": 401, "status": "Failure"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (mut login, harness) = orchestrator(&server, FakeProvider::default());
    login.select_mode(AuthenticationMode::Token);
    login.on_input(&token_input("wrong-token"));

    assert_eq!(login.login().await, LoginOutcome::Halted);

    let errors = login.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, 401);
    assert_eq!(errors[0].status, "Unauthorized");
    assert_eq!(errors[0].message, "MSG_LOGIN_UNAUTHORIZED_ERROR");

    // Rejected attempt still persisted the mode, and nothing was refreshed.
    assert_eq!(harness.jar.write_count(AUTH_MODE_COOKIE), 1);
    assert_eq!(harness.plugins.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_failure_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let (mut login, _harness) = orchestrator(&server, FakeProvider::default());
    login.select_mode(AuthenticationMode::Token);
    login.on_input(&token_input("tok"));

    assert_eq!(login.login().await, LoginOutcome::Halted);
    assert_eq!(login.errors().len(), 1);
    assert_eq!(login.errors()[0].code, 502);
}

#[tokio::test]
async fn test_basic_login_submits_username_and_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .and(body_json(
            serde_json::json!({"username": "admin", "password": "hunter2"}),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"errors": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (mut login, _harness) = orchestrator(&server, FakeProvider::default());
    login.select_mode(AuthenticationMode::Basic);
    login.on_input(&CredentialInput::Field {
        id: "username".to_string(),
        value: "admin".to_string(),
    });
    login.on_input(&CredentialInput::Field {
        id: "password".to_string(),
        value: "hunter2".to_string(),
    });

    assert!(matches!(login.login().await, LoginOutcome::NavigatedTo(_)));
}

#[tokio::test]
async fn test_provider_login_activates_account_then_notifies_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login/azuread"))
        .and(body_json(serde_json::json!({"username": "u", "idToken": "t"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let account = Account {
        username: "u".to_string(),
        id_token: "t".to_string(),
    };
    let provider = FakeProvider::with_popup_account(account.clone());
    let (mut login, harness) = orchestrator(&server, provider);

    // A stale interaction marker must not survive the attempt.
    let mut session = harness.session.clone();
    session.set(INTERACTION_STATUS_MARKER, "interaction_in_progress");

    login.select_mode(AuthenticationMode::AzureAd);
    assert_eq!(
        login.login().await,
        LoginOutcome::NavigatedTo("pods".to_string())
    );

    assert_eq!(harness.provider.active_account(), Some(account));
    assert_eq!(harness.session.get(INTERACTION_STATUS_MARKER), None);
    assert_eq!(harness.jar.value(AUTH_MODE_COOKIE).as_deref(), Some("AzureAD"));
}

#[tokio::test]
async fn test_provider_rejection_surfaces_error_without_backend_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login/azuread"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (mut login, _harness) = orchestrator(&server, FakeProvider::default());
    login.select_mode(AuthenticationMode::AzureAd);

    assert_eq!(login.login().await, LoginOutcome::Halted);
    assert_eq!(login.errors().len(), 1);
    assert_eq!(login.errors()[0].status, "Unauthorized");
    assert!(login.errors()[0].message.contains("user closed the popup"));
}

#[tokio::test]
async fn test_embedded_context_refuses_popup_sign_in() {
    let server = MockServer::start().await;
    let provider = FakeProvider::with_popup_account(Account {
        username: "u".to_string(),
        id_token: "t".to_string(),
    });

    let mut history = History::new();
    history.record("pods");
    let mut login = LoginOrchestrator::new(LoginCollaborators {
        client: DashboardClient::new(server.uri()),
        provider: Box::new(provider),
        cookies: Box::new(SharedJar::default()),
        session: Box::new(SharedSession::default()),
        navigator: Box::new(history),
        plugins: Box::new(CountingPlugins::default()),
        is_embedded: true,
    });

    login.select_mode(AuthenticationMode::AzureAd);
    assert_eq!(login.login().await, LoginOutcome::Halted);
    assert!(login.errors()[0].message.contains("embedded"));
}

#[tokio::test]
async fn test_initialize_applies_modes_and_auto_skips() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/modes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"modes": ["basic", "token"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/skippable"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"skippable": true})),
        )
        .mount(&server)
        .await;

    let (mut login, harness) = orchestrator(&server, FakeProvider::default());
    let outcome = login
        .initialize(NavigationContext {
            skip_query_param: Some("true".to_string()),
            error: None,
        })
        .await;

    // basic was dropped by the inherited splice; AzureAD appended.
    assert_eq!(
        login.enabled_modes(),
        &[AuthenticationMode::Token, AuthenticationMode::AzureAd]
    );
    assert!(login.is_skip_enabled());

    assert_eq!(outcome, Some(LoginOutcome::NavigatedTo("pods".to_string())));
    assert_eq!(harness.jar.value(SKIP_LOGIN_COOKIE).as_deref(), Some("true"));
}

#[tokio::test]
async fn test_no_auto_skip_unless_param_is_literal_true() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/modes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"modes": ["token"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/skippable"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"skippable": true})),
        )
        .mount(&server)
        .await;

    for param in [None, Some("1".to_string()), Some("TRUE".to_string())] {
        let (mut login, _harness) = orchestrator(&server, FakeProvider::default());
        let outcome = login
            .initialize(NavigationContext {
                skip_query_param: param,
                error: None,
            })
            .await;
        assert_eq!(outcome, None);
    }
}

#[tokio::test]
async fn test_no_auto_skip_when_backend_not_skippable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/modes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"modes": ["token"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/skippable"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"skippable": false})),
        )
        .mount(&server)
        .await;

    let (mut login, _harness) = orchestrator(&server, FakeProvider::default());
    let outcome = login
        .initialize(NavigationContext {
            skip_query_param: Some("true".to_string()),
            error: None,
        })
        .await;

    assert_eq!(outcome, None);
    assert!(!login.is_skip_enabled());
}

#[tokio::test]
async fn test_initialize_logs_in_existing_provider_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/modes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"modes": ["token"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/skippable"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"skippable": false})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login/azuread"))
        .and(body_json(
            serde_json::json!({"username": "persisted", "idToken": "jwt"}),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let account = Account {
        username: "persisted".to_string(),
        id_token: "jwt".to_string(),
    };
    let provider = FakeProvider::with_existing_account(account.clone());
    let (mut login, harness) = orchestrator(&server, provider);

    let outcome = login.initialize(NavigationContext::default()).await;
    assert_eq!(outcome, Some(LoginOutcome::NavigatedTo("pods".to_string())));
    // None was active; the first (only) account got activated.
    assert_eq!(harness.provider.active_account(), Some(account));
}

#[tokio::test]
async fn test_initialize_surfaces_navigation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/modes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"modes": ["token"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/skippable"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"skippable": false})),
        )
        .mount(&server)
        .await;

    let (mut login, _harness) = orchestrator(&server, FakeProvider::default());
    let carried = dashgate_core::error::AuthError {
        code: 401,
        status: "Unauthorized".to_string(),
        message: "session expired".to_string(),
    };
    let outcome = login
        .initialize(NavigationContext {
            skip_query_param: None,
            error: Some(carried.clone()),
        })
        .await;

    assert_eq!(outcome, None);
    assert_eq!(login.errors(), &[carried]);
}

#[tokio::test]
async fn test_errors_reset_between_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"errors": []})),
        )
        .mount(&server)
        .await;

    let (mut login, _harness) = orchestrator(&server, FakeProvider::default());
    login.select_mode(AuthenticationMode::Token);

    // First attempt fails locally.
    assert_eq!(login.login().await, LoginOutcome::Halted);
    assert_eq!(login.errors().len(), 1);

    // Second attempt succeeds and clears the list.
    login.on_input(&token_input("tok"));
    assert!(matches!(login.login().await, LoginOutcome::NavigatedTo(_)));
    assert!(login.errors().is_empty());
}

#[tokio::test]
async fn test_restored_cookie_mode_drives_submission() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/modes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"modes": ["kubeconfig", "token"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/login/skippable"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"skippable": false})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .and(body_json(serde_json::json!({"kubeConfig": "apiVersion: v1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"errors": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let jar = SharedJar::default();
    jar.clone().set(AUTH_MODE_COOKIE, "kubeconfig", SameSite::Strict);

    let mut history = History::new();
    history.record("pods");
    let mut login = LoginOrchestrator::new(LoginCollaborators {
        client: DashboardClient::new(server.uri()),
        provider: Box::new(FakeProvider::default()),
        cookies: Box::new(jar),
        session: Box::new(SharedSession::default()),
        navigator: Box::new(history),
        plugins: Box::new(CountingPlugins::default()),
        is_embedded: false,
    });

    login.initialize(NavigationContext::default()).await;
    assert_eq!(login.selected_mode(), Some(AuthenticationMode::Kubeconfig));

    login.on_input(&CredentialInput::FileLoaded {
        content: "apiVersion: v1".to_string(),
    });
    assert!(matches!(login.login().await, LoginOutcome::NavigatedTo(_)));
}
