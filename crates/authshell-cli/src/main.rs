//! authshell - a terminal host for the authshell session manager.
//!
//! Signs in against the configured auth service, keeps the session alive
//! across restarts and logs out automatically after a period of inactivity.

mod app;
mod forms;

use std::path::Path;

use anyhow::{Context, Result};
use authshell_core::Config;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

/// Log file name inside the data directory
const LOG_FILE: &str = "authshell.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a file so they never interleave with the prompt. The returned
/// guard flushes the writer on drop and must live until exit.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    config.apply_env();

    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
    let _log_guard = init_tracing(&data_dir);
    info!(api = %config.api_base_url, "authshell starting");

    let mut app = App::new(config)?;
    if let Err(e) = app.run().await {
        eprintln!("Error: {:#}", e);
    }

    info!("authshell shutting down");
    Ok(())
}
