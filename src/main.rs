/// sqlpilot: human-reviewed natural-language to SQL assistant
///
/// Main entry point for the sqlpilot server. Loads configuration from the
/// environment and starts the HTTP server.

use sqlpilot::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Session API at /api/sessions/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // SQLPILOT_* environment variables override the defaults
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
