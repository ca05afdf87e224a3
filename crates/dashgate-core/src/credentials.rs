//! Credential capture and the login request payload.
//!
//! Raw input is routed into exactly one slot based on the selected
//! authentication mode; nothing is validated for format here (a kubeconfig
//! is not parsed locally), structure checks belong to the backend.

use serde::{Deserialize, Serialize};

use crate::modes::AuthenticationMode;

/// Field id that distinguishes the username input in basic mode. Any other
/// field id in basic mode is treated as the password input.
pub const USERNAME_FIELD: &str = "username";

/// A single piece of raw credential input.
#[derive(Debug, Clone)]
pub enum CredentialInput {
    /// Text content of an uploaded file (kubeconfig mode).
    FileLoaded { content: String },
    /// Value of a named input field.
    Field { id: String, value: String },
}

/// Mode-dependent login request payload, serialized with the backend's
/// exact field names. Only the slots matching the submitted mode are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSpec {
    #[serde(rename = "kubeConfig", skip_serializing_if = "Option::is_none")]
    pub kube_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Collects raw credential material keyed by the selected mode.
#[derive(Debug, Default)]
pub struct CredentialCapture {
    kubeconfig: Option<String>,
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl CredentialCapture {
    /// Routes one input event into the slot for the given mode.
    ///
    /// Token values are trimmed on entry; the token slot is shared between
    /// token mode and manual entry alongside provider sign-in.
    pub fn record(&mut self, mode: AuthenticationMode, input: &CredentialInput) {
        match (mode, input) {
            (AuthenticationMode::Kubeconfig, CredentialInput::FileLoaded { content }) => {
                self.kubeconfig = Some(content.clone());
            }
            (
                AuthenticationMode::Token | AuthenticationMode::AzureAd,
                CredentialInput::Field { value, .. },
            ) => {
                self.token = Some(value.trim().to_string());
            }
            (AuthenticationMode::Basic, CredentialInput::Field { id, value }) => {
                if id == USERNAME_FIELD {
                    self.username = Some(value.clone());
                } else {
                    self.password = Some(value.clone());
                }
            }
            _ => {}
        }
    }

    /// Whether the token slot is empty or whitespace-only.
    pub fn has_empty_token(&self) -> bool {
        self.token
            .as_deref()
            .is_none_or(|t| t.trim().is_empty())
    }

    /// Builds the submission payload for the given mode. An unselected mode
    /// yields the empty spec.
    pub fn login_spec(&self, mode: Option<AuthenticationMode>) -> LoginSpec {
        match mode {
            Some(AuthenticationMode::Kubeconfig) => LoginSpec {
                kube_config: self.kubeconfig.clone(),
                ..LoginSpec::default()
            },
            Some(AuthenticationMode::Token | AuthenticationMode::AzureAd) => LoginSpec {
                token: self.token.clone(),
                ..LoginSpec::default()
            },
            Some(AuthenticationMode::Basic) => LoginSpec {
                username: self.username.clone(),
                password: self.password.clone(),
                ..LoginSpec::default()
            },
            None => LoginSpec::default(),
        }
    }
}
