//! Login negotiation for cluster-dashboard backends.
//!
//! The pieces mirror the login screen of the dashboard UI: a mode registry
//! tracks which authentication modes the backend offers, credential capture
//! collects raw input for the selected mode, and the [`login::LoginOrchestrator`]
//! validates, submits and interprets a login attempt, either against the
//! backend's login endpoint or through an external identity provider.

pub mod bridge;
pub mod client;
pub mod cookies;
pub mod credentials;
pub mod error;
pub mod history;
pub mod login;
pub mod modes;
pub mod paths;
