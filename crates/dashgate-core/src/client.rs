//! HTTP client for the dashboard backend's login endpoints.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::credentials::LoginSpec;
use crate::error::K8sError;
use crate::modes::AuthenticationMode;

/// Default backend address when neither flag nor env override is present.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Env var the CLI reads for the backend base URL.
pub const BASE_URL_ENV: &str = "DASHGATE_URL";

#[derive(Debug, Deserialize)]
struct EnabledAuthenticationModes {
    modes: Vec<AuthenticationMode>,
}

#[derive(Debug, Deserialize)]
struct LoginSkippableResponse {
    skippable: bool,
}

/// Backend response to a login submission. An empty error list signals
/// success; the encrypted token is managed by the backend session layer and
/// carried here only for completeness.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default, rename = "jweToken")]
    pub jwe_token: Option<String>,
    #[serde(default)]
    pub errors: Vec<K8sError>,
}

/// Backend login feature flags.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LoginStatus {
    #[serde(rename = "tokenPresent")]
    pub token_present: bool,
    #[serde(rename = "headerPresent")]
    pub header_present: bool,
    #[serde(rename = "httpsMode")]
    pub https_mode: bool,
}

#[derive(Debug, Serialize)]
struct ProviderCredentials<'a> {
    username: &'a str,
    #[serde(rename = "idToken")]
    id_token: &'a str,
}

/// Client for the dashboard backend's login API.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Fetches the authentication modes the backend has enabled.
    pub async fn enabled_modes(&self) -> Result<Vec<AuthenticationMode>> {
        let response: EnabledAuthenticationModes = self
            .http
            .get(self.url("api/v1/login/modes"))
            .send()
            .await
            .context("Failed to fetch enabled login modes")?
            .error_for_status()
            .context("Enabled login modes request rejected")?
            .json()
            .await
            .context("Failed to parse enabled login modes")?;

        tracing::debug!(modes = ?response.modes, "backend login modes");
        Ok(response.modes)
    }

    /// Fetches whether the backend allows bypassing login entirely.
    pub async fn login_skippable(&self) -> Result<bool> {
        let response: LoginSkippableResponse = self
            .http
            .get(self.url("api/v1/login/skippable"))
            .send()
            .await
            .context("Failed to fetch login skippable flag")?
            .error_for_status()
            .context("Login skippable request rejected")?
            .json()
            .await
            .context("Failed to parse login skippable flag")?;

        Ok(response.skippable)
    }

    /// Fetches the backend's login feature flags.
    pub async fn login_status(&self) -> Result<LoginStatus> {
        self.http
            .get(self.url("api/v1/login/status"))
            .send()
            .await
            .context("Failed to fetch login status")?
            .error_for_status()
            .context("Login status request rejected")?
            .json()
            .await
            .context("Failed to parse login status")
    }

    /// Submits a credential payload to the login endpoint.
    ///
    /// A 200-class response may still carry a non-empty error list; that is
    /// a backend rejection, not a transport failure, and is returned as data.
    pub async fn login(&self, spec: &LoginSpec) -> Result<AuthResponse> {
        self.http
            .post(self.url("api/v1/login"))
            .json(spec)
            .send()
            .await
            .context("Failed to submit login request")?
            .error_for_status()
            .context("Login request rejected")?
            .json()
            .await
            .context("Failed to parse login response")
    }

    /// Forwards identity-provider credentials to the backend's
    /// credential-acceptance endpoint.
    pub async fn accept_provider_credentials(
        &self,
        username: &str,
        id_token: &str,
    ) -> Result<()> {
        self.http
            .post(self.url("api/v1/login/azuread"))
            .json(&ProviderCredentials { username, id_token })
            .send()
            .await
            .context("Failed to forward provider credentials")?
            .error_for_status()
            .context("Provider credentials rejected by backend")?;

        tracing::debug!(username, "provider credentials accepted");
        Ok(())
    }

    /// Reloads the plugin configuration subsystem after a successful login.
    pub async fn refresh_plugin_config(&self) -> Result<()> {
        self.http
            .get(self.url("api/v1/plugin/config"))
            .send()
            .await
            .context("Failed to refresh plugin config")?
            .error_for_status()
            .context("Plugin config request rejected")?;

        Ok(())
    }
}
