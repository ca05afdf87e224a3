//! Modes command handler.

use anyhow::Result;

use dashgate_core::client::DashboardClient;
use dashgate_core::modes::ModeRegistry;

pub async fn run(url: &str) -> Result<()> {
    let client = DashboardClient::new(url);

    let mut registry = ModeRegistry::new();
    registry.apply_backend_modes(client.enabled_modes().await?);

    println!("Available login modes:");
    for mode in registry.enabled() {
        println!("  - {mode}");
    }

    let skippable = client.login_skippable().await.unwrap_or(false);
    println!("Login can be skipped: {}", if skippable { "yes" } else { "no" });

    if let Ok(status) = client.login_status().await {
        println!(
            "Serving over HTTPS: {}",
            if status.https_mode { "yes" } else { "no" }
        );
    }

    Ok(())
}
