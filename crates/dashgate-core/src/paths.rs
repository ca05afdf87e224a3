//! Path resolution for dashgate configuration and state.
//!
//! DASHGATE_HOME resolution order:
//! 1. DASHGATE_HOME environment variable (if set)
//! 2. ~/.config/dashgate (default)

use std::path::PathBuf;

/// Returns the dashgate home directory.
///
/// Checks DASHGATE_HOME env var first, falls back to ~/.config/dashgate
pub fn dashgate_home() -> PathBuf {
    if let Ok(home) = std::env::var("DASHGATE_HOME") {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .map(|h| h.join(".config").join("dashgate"))
        .expect("Could not determine home directory")
}

/// Returns the path to the persisted cookie jar.
pub fn cookies_path() -> PathBuf {
    dashgate_home().join("cookies.json")
}
