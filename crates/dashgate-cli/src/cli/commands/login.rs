//! Login, skip and logout command handlers.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use dashgate_core::bridge::browser::{BrowserProvider, BrowserProviderConfig};
use dashgate_core::bridge::{IdentityProvider, MemorySessionStore, UnconfiguredProvider};
use dashgate_core::client::DashboardClient;
use dashgate_core::cookies::FileCookieJar;
use dashgate_core::credentials::CredentialInput;
use dashgate_core::history::History;
use dashgate_core::login::{
    HttpPluginConfig, LoginCollaborators, LoginOrchestrator, LoginOutcome, NavigationContext,
};
use dashgate_core::modes::AuthenticationMode;

/// How the user asked to authenticate.
pub enum Mode {
    Kubeconfig(PathBuf),
    Token(String),
    Basic { username: Option<String> },
    Azure,
}

pub async fn run(url: &str, mode: Mode, skip_if_allowed: bool) -> Result<()> {
    let mut login = build_orchestrator(url, matches!(mode, Mode::Azure))?;

    let ctx = NavigationContext {
        skip_query_param: skip_if_allowed.then(|| "true".to_string()),
        error: None,
    };
    if let Some(LoginOutcome::NavigatedTo(route)) = login.initialize(ctx).await {
        println!("✓ Signed in without credential entry, continuing to '{route}'");
        return Ok(());
    }

    match mode {
        Mode::Kubeconfig(file) => {
            login.select_mode(AuthenticationMode::Kubeconfig);
            let content = fs::read_to_string(&file)
                .with_context(|| format!("read kubeconfig from {}", file.display()))?;
            login.on_input(&CredentialInput::FileLoaded { content });
        }
        Mode::Token(token) => {
            login.select_mode(AuthenticationMode::Token);
            login.on_input(&CredentialInput::Field {
                id: "token".to_string(),
                value: token,
            });
        }
        Mode::Basic { username } => {
            login.select_mode(AuthenticationMode::Basic);
            let username = match username {
                Some(username) => username,
                None => prompt_line("Username: ")?,
            };
            login.on_input(&CredentialInput::Field {
                id: "username".to_string(),
                value: username,
            });
            let password = prompt_line("Password: ")?;
            login.on_input(&CredentialInput::Field {
                id: "password".to_string(),
                value: password,
            });
        }
        Mode::Azure => {
            login.select_mode(AuthenticationMode::AzureAd);
            println!("A browser window will open for identity-provider sign-in.");
        }
    }

    match login.login().await {
        LoginOutcome::NavigatedTo(route) => {
            println!("✓ Logged in, continuing to '{route}'");
            Ok(())
        }
        LoginOutcome::Halted => {
            for error in login.errors() {
                eprintln!("  {error}");
            }
            anyhow::bail!("Login failed")
        }
    }
}

pub async fn skip(url: &str) -> Result<()> {
    let mut login = build_orchestrator(url, false)?;

    if let Some(LoginOutcome::NavigatedTo(route)) =
        login.initialize(NavigationContext::default()).await
    {
        println!("✓ Signed in without credential entry, continuing to '{route}'");
        return Ok(());
    }

    if !login.is_skip_enabled() {
        anyhow::bail!("The backend does not allow skipping login");
    }

    if let LoginOutcome::NavigatedTo(route) = login.skip() {
        println!("✓ Login skipped, continuing to '{route}'");
    }
    Ok(())
}

pub async fn logout(url: &str, popup: bool) -> Result<()> {
    let mut login = build_orchestrator(url, true)?;
    login.logout(popup).await?;
    println!("✓ Signed out from the identity provider");
    Ok(())
}

fn build_orchestrator(url: &str, azure: bool) -> Result<LoginOrchestrator> {
    let client = DashboardClient::new(url);

    let provider: Box<dyn IdentityProvider> = if azure {
        Box::new(browser_provider_from_env()?)
    } else {
        Box::new(UnconfiguredProvider)
    };

    let cookies = FileCookieJar::load().context("load cookie jar")?;

    Ok(LoginOrchestrator::new(LoginCollaborators {
        client: client.clone(),
        provider,
        cookies: Box::new(cookies),
        session: Box::new(MemorySessionStore::default()),
        navigator: Box::new(History::new()),
        plugins: Box::new(HttpPluginConfig::new(client)),
        is_embedded: false,
    }))
}

fn browser_provider_from_env() -> Result<BrowserProvider> {
    let client_id = std::env::var("DASHGATE_AAD_CLIENT_ID")
        .context("DASHGATE_AAD_CLIENT_ID is not set (identity-provider client id)")?;
    let authority = std::env::var("DASHGATE_AAD_AUTHORITY")
        .context("DASHGATE_AAD_AUTHORITY is not set (identity-provider authority URL)")?;
    let callback_port = std::env::var("DASHGATE_AAD_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8615);

    Ok(BrowserProvider::new(BrowserProviderConfig {
        client_id,
        authority,
        callback_port,
    }))
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
