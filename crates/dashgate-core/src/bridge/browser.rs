//! Browser-based sign-in against an OIDC authority.
//!
//! The "popup" of the web dashboard maps to opening the system browser and
//! catching the authorization code on a local HTTP callback, then exchanging
//! it for an ID token with PKCE. Set `DASHGATE_NO_BROWSER` to suppress the
//! browser launch (tests, headless hosts).

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use sha2::{Digest, Sha256};

use super::{Account, IdentityProvider};

/// Path the authority redirects back to on the local listener.
pub const LOCAL_CALLBACK_PATH: &str = "/auth/callback";

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);
const SCOPES: &str = "openid profile email";

/// Authority settings for the browser provider.
#[derive(Debug, Clone)]
pub struct BrowserProviderConfig {
    /// OAuth client id registered with the authority.
    pub client_id: String,
    /// Authority base URL, e.g. `https://login.microsoftonline.com/<tenant>`.
    pub authority: String,
    /// Local port the callback listener binds to.
    pub callback_port: u16,
}

#[derive(Debug, Default)]
struct ProviderState {
    accounts: Vec<Account>,
    active: Option<String>,
}

/// PKCE code verifier and challenge.
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

/// Generate PKCE code verifier and challenge.
pub fn generate_pkce() -> Pkce {
    use rand::Rng;
    let mut rng = rand::rng();
    let verifier_bytes: [u8; 32] = rng.random();
    let verifier = BASE64_URL_SAFE_NO_PAD.encode(verifier_bytes);

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = BASE64_URL_SAFE_NO_PAD.encode(hasher.finalize());

    Pkce {
        verifier,
        challenge,
    }
}

/// Identity provider backed by the system browser and a local callback.
pub struct BrowserProvider {
    config: BrowserProviderConfig,
    http: reqwest::Client,
    state: Mutex<ProviderState>,
}

impl BrowserProvider {
    pub fn new(config: BrowserProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            state: Mutex::new(ProviderState::default()),
        }
    }

    fn redirect_uri(&self) -> String {
        format!(
            "http://localhost:{}{}",
            self.config.callback_port, LOCAL_CALLBACK_PATH
        )
    }

    /// Build the authorization URL for the configured authority.
    fn build_auth_url(&self, pkce: &Pkce, oauth_state: &str) -> String {
        let redirect_uri = self.redirect_uri();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "code"),
            ("response_mode", "query"),
            ("redirect_uri", &redirect_uri),
            ("scope", SCOPES),
            ("code_challenge", &pkce.challenge),
            ("code_challenge_method", "S256"),
            ("state", oauth_state),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}/oauth2/v2.0/authorize?{}", self.config.authority, query)
    }

    /// Exchange an authorization code for an ID token.
    async fn exchange_code(&self, code: &str, pkce: &Pkce) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/oauth2/v2.0/token", self.config.authority))
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", &self.config.client_id),
                ("code", code),
                ("redirect_uri", &self.redirect_uri()),
                ("code_verifier", &pkce.verifier),
                ("scope", SCOPES),
            ])
            .send()
            .await
            .context("Failed to send token exchange request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token exchange failed (HTTP {}): {}", status, body);
        }

        #[derive(serde::Deserialize)]
        struct TokenResponse {
            id_token: String,
        }

        let token_data: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        Ok(token_data.id_token)
    }

    async fn sign_in(&self) -> Result<Account> {
        let pkce = generate_pkce();
        let oauth_state = uuid::Uuid::new_v4().to_string();
        let auth_url = self.build_auth_url(&pkce, &oauth_state);

        tracing::debug!(port = self.config.callback_port, "starting browser sign-in");
        if std::env::var("DASHGATE_NO_BROWSER").is_err() {
            let _ = open::that(&auth_url);
        }

        // The callback wait blocks for up to the timeout; keep it off the
        // async worker threads.
        let port = self.config.callback_port;
        let expected_state = oauth_state.clone();
        let code = tokio::task::spawn_blocking(move || wait_for_local_code(&expected_state, port))
            .await
            .context("Sign-in callback listener task failed")?
            .ok_or_else(|| anyhow::anyhow!("Timed out waiting for sign-in callback"))?;

        let id_token = self.exchange_code(&code, &pkce).await?;
        let username = username_from_id_token(&id_token)?;

        let account = Account { username, id_token };
        let mut state = self.state.lock().expect("provider state poisoned");
        state
            .accounts
            .retain(|a| a.username != account.username);
        state.accounts.push(account.clone());

        Ok(account)
    }
}

#[async_trait]
impl IdentityProvider for BrowserProvider {
    fn accounts(&self) -> Vec<Account> {
        self.state
            .lock()
            .expect("provider state poisoned")
            .accounts
            .clone()
    }

    fn active_account(&self) -> Option<Account> {
        let state = self.state.lock().expect("provider state poisoned");
        let active = state.active.as_deref()?;
        state.accounts.iter().find(|a| a.username == active).cloned()
    }

    fn set_active_account(&self, account: &Account) {
        let mut state = self.state.lock().expect("provider state poisoned");
        state.active = Some(account.username.clone());
    }

    async fn login_popup(&self) -> Result<Account> {
        self.sign_in().await
    }

    // A terminal client has no window to hand over; the redirect variant
    // runs the same browser round-trip.
    async fn login_redirect(&self) -> Result<Account> {
        self.sign_in().await
    }

    async fn logout_popup(&self) -> Result<()> {
        let mut state = self.state.lock().expect("provider state poisoned");
        state.accounts.clear();
        state.active = None;
        Ok(())
    }

    async fn logout_redirect(&self) -> Result<()> {
        if std::env::var("DASHGATE_NO_BROWSER").is_err() {
            let _ = open::that(format!("{}/oauth2/v2.0/logout", self.config.authority));
        }
        self.logout_popup().await
    }
}

/// Reads the username claim out of an ID token without verifying it.
/// Verification is the backend's job; the name is only for display and the
/// credential-acceptance call.
fn username_from_id_token(id_token: &str) -> Result<String> {
    let payload = id_token
        .split('.')
        .nth(1)
        .context("ID token is not a JWT")?;
    let decoded = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .context("Failed to decode ID token payload")?;
    let claims: serde_json::Value =
        serde_json::from_slice(&decoded).context("Failed to parse ID token claims")?;

    for claim in ["preferred_username", "upn", "email"] {
        if let Some(name) = claims.get(claim).and_then(|v| v.as_str()) {
            return Ok(name.to_string());
        }
    }
    anyhow::bail!("ID token carries no username claim")
}

fn wait_for_local_code(state: &str, port: u16) -> Option<String> {
    let listener = match TcpListener::bind(format!("127.0.0.1:{}", port)) {
        Ok(listener) => listener,
        Err(_) => return None,
    };
    let _ = listener.set_nonblocking(true);

    let (tx, rx) = std::sync::mpsc::channel::<Option<String>>();
    let state = state.to_string();

    std::thread::spawn(move || {
        let start = std::time::Instant::now();
        loop {
            match listener.accept() {
                Ok((mut stream, _)) => {
                    let mut buffer = [0u8; 2048];
                    let _ = stream.read(&mut buffer);
                    let request = String::from_utf8_lossy(&buffer);
                    let code = extract_code_from_request(&request, &state);
                    let response = if code.is_some() {
                        callback_success_response()
                    } else {
                        callback_error_response()
                    };
                    let _ = stream.write_all(response.as_bytes());
                    let _ = tx.send(code);
                    break;
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > CALLBACK_TIMEOUT {
                        let _ = tx.send(None);
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(_) => {
                    let _ = tx.send(None);
                    break;
                }
            }
        }
    });

    rx.recv_timeout(CALLBACK_TIMEOUT).ok().flatten()
}

fn extract_code_from_request(request: &str, expected_state: &str) -> Option<String> {
    let mut lines = request.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    let path = parts.next()?;

    let url = url::Url::parse(&format!("http://localhost{}", path)).ok()?;
    if url.path() != LOCAL_CALLBACK_PATH {
        return None;
    }
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())?;
    if state != expected_state {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
}

fn callback_success_response() -> String {
    let body = "<!doctype html><html><head><meta charset=\"utf-8\" /><title>Sign-in complete</title></head><body><p>Sign-in complete. Return to your terminal to continue.</p></body></html>";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

fn callback_error_response() -> String {
    let body = "Invalid sign-in callback";
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}
