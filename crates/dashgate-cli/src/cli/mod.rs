//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dashgate_core::client::{BASE_URL_ENV, DEFAULT_BASE_URL};

mod commands;

#[derive(Parser)]
#[command(name = "dashgate")]
#[command(version)]
#[command(about = "Terminal login client for cluster-dashboard backends")]
struct Cli {
    /// Dashboard backend base URL
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List the authentication modes the backend offers
    Modes,

    /// Sign in to the dashboard backend
    Login {
        /// Authenticate with the contents of a kubeconfig file
        #[arg(long, value_name = "FILE")]
        kubeconfig: Option<PathBuf>,

        /// Authenticate with a bearer token
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,

        /// Authenticate with username and password
        #[arg(long)]
        basic: bool,

        /// Username for --basic (prompted if omitted)
        #[arg(long, requires = "basic")]
        username: Option<String>,

        /// Sign in through the configured identity provider
        #[arg(long)]
        azure: bool,

        /// Bypass login automatically if the backend allows it
        #[arg(long = "skip-if-allowed")]
        skip_if_allowed: bool,
    },

    /// Bypass login explicitly (only when the backend allows it)
    Skip,

    /// Sign out from the identity provider
    Logout {
        /// Popup-style sign-out (keeps the provider session page closed)
        #[arg(long)]
        popup: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Modes => commands::modes::run(&cli.url).await,

        Commands::Login {
            kubeconfig,
            token,
            basic,
            username,
            azure,
            skip_if_allowed,
        } => {
            let mode = match (kubeconfig, token, basic, azure) {
                (Some(file), None, false, false) => commands::login::Mode::Kubeconfig(file),
                (None, Some(token), false, false) => commands::login::Mode::Token(token),
                (None, None, true, false) => commands::login::Mode::Basic { username },
                (None, None, false, true) => commands::login::Mode::Azure,
                _ => anyhow::bail!(
                    "Please specify exactly one login mode: --kubeconfig <file>, --token <token>, --basic, or --azure"
                ),
            };
            commands::login::run(&cli.url, mode, skip_if_allowed).await
        }

        Commands::Skip => commands::login::skip(&cli.url).await,

        Commands::Logout { popup } => commands::login::logout(&cli.url, popup).await,
    }
}
