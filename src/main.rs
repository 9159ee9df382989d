/// Phaseway server entry point
///
/// Loads configuration from the environment and starts the HTTP server:
/// - Session API at /api/sessions/*
/// - Draft listing and discard at /api/drafts/*
/// - Health check at /healthz

use phaseway::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to 0.0.0.0:3004 with drafts under ./data
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
