//! Normalized error records for the login surface.
//!
//! Every failure shown to the user (local validation, a backend rejection,
//! a transport failure or an identity-provider refusal) is reduced to the
//! same `{code, status, message}` shape before display.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized error record rendered by the login surface, regardless of
/// where the failure originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthError {
    /// HTTP-style status code (0 when no status applies).
    pub code: u16,
    /// Short status phrase ("Bad Request", "Unauthorized", ...).
    pub status: String,
    /// One-line summary suitable for display.
    pub message: String,
}

impl AuthError {
    /// Creates a local validation error. No request was made.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: 400,
            status: status_phrase(400).to_string(),
            message: message.into(),
        }
    }

    /// Translates a failed request into a normalized record.
    ///
    /// Chains through anyhow to recover the HTTP status when the underlying
    /// failure was a `reqwest` status error; plain connection failures get
    /// code 0.
    pub fn from_transport(err: &anyhow::Error) -> Self {
        let status = err
            .downcast_ref::<reqwest::Error>()
            .and_then(reqwest::Error::status);
        match status {
            Some(status) => Self {
                code: status.as_u16(),
                status: status_phrase(status.as_u16()).to_string(),
                message: format!("{err:#}"),
            },
            None => Self {
                code: 0,
                status: "Connection Error".to_string(),
                message: format!("{err:#}"),
            },
        }
    }

    /// Translates an identity-provider refusal into a normalized record.
    pub fn from_provider(err: &anyhow::Error) -> Self {
        Self {
            code: 401,
            status: status_phrase(401).to_string(),
            message: format!("{err:#}"),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.status, self.code, self.message)
    }
}

/// Error entry as the backend reports it: a Kubernetes API machinery
/// `Status` object wrapped under `ErrStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct K8sError {
    #[serde(rename = "ErrStatus")]
    pub err_status: ErrStatus,
}

/// Kubernetes API machinery `Status` fields the login surface cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrStatus {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: String,
}

impl K8sError {
    /// Normalizes the backend entry for display.
    pub fn to_auth_error(&self) -> AuthError {
        AuthError {
            code: self.err_status.code,
            status: status_phrase(self.err_status.code).to_string(),
            message: self.err_status.message.clone(),
        }
    }
}

fn status_phrase(code: u16) -> &'static str {
    match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown Error",
    }
}
