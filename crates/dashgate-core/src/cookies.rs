//! Cookie-style persistence for login preferences.
//!
//! The dashboard UI keeps two pieces of state across sessions: the last-used
//! authentication mode and the explicit skip-login marker. Both live in a
//! small jar persisted as JSON under `${DASHGATE_HOME}/cookies.json` with
//! restricted permissions (0600). Tests use the in-memory jar.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::paths;

/// Cookie name for the last-used authentication mode.
pub const AUTH_MODE_COOKIE: &str = "lastLoginMode";

/// Cookie name for the explicit skip-login marker consulted by backend-side
/// authorization checks.
pub const SKIP_LOGIN_COOKIE: &str = "skipLoginPage";

/// Same-site policy attached to a stored cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
}

/// A stored cookie: value plus the policy it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub value: String,
    pub same_site: SameSite,
}

/// Minimal cookie-jar surface the login orchestrator needs.
pub trait CookieJar: Send {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str, same_site: SameSite);
}

/// In-memory jar for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryCookieJar {
    cookies: HashMap<String, Cookie>,
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|c| c.value.clone())
    }

    fn set(&mut self, name: &str, value: &str, same_site: SameSite) {
        self.cookies.insert(
            name.to_string(),
            Cookie {
                value: value.to_string(),
                same_site,
            },
        );
    }
}

/// Jar persisted to disk so the mode choice survives across runs.
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    cookies: HashMap<String, Cookie>,
}

impl FileCookieJar {
    /// Loads the jar from the default location.
    /// Returns an empty jar if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(paths::cookies_path())
    }

    /// Loads the jar from an explicit path.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path,
                cookies: HashMap::new(),
            });
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cookie jar from {}", path.display()))?;
        let cookies = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cookie jar from {}", path.display()))?;

        Ok(Self { path, cookies })
    }

    /// Saves the jar with restricted permissions (0600).
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(&self.cookies).context("Failed to serialize cookie jar")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }
}

impl CookieJar for FileCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|c| c.value.clone())
    }

    fn set(&mut self, name: &str, value: &str, same_site: SameSite) {
        self.cookies.insert(
            name.to_string(),
            Cookie {
                value: value.to_string(),
                same_site,
            },
        );
        if let Err(err) = self.save() {
            tracing::warn!("failed to persist cookie jar: {err:#}");
        }
    }
}
