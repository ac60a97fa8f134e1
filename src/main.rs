mod host;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use offscreen::{FileSessionStore, MemorySessionStore, OffscreenConfig, SessionStore};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "offscreen-host", about = "Runs the offscreen bridge over newline-delimited JSON on stdio")]
struct Cli {
    /// JSON file backing the persisted session. In-memory when omitted.
    #[arg(long, env = "OFFSCREEN_SESSION_FILE")]
    session_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = OffscreenConfig::from_env();
    let store: Arc<dyn SessionStore> = match &cli.session_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "offscreen-host: file-backed session store");
            Arc::new(FileSessionStore::new(path))
        }
        None => Arc::new(MemorySessionStore::new()),
    };

    tracing::info!(session_key = %config.session_key, "offscreen-host: serving on stdio");
    match host::serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), config, store).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "offscreen-host: stopped");
            ExitCode::FAILURE
        }
    }
}
