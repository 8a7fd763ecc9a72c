//! Scribe binary.
//!
//! ```bash
//! X_BOT_HANDLE=ScribeBot GEMINI_API_KEY=xxx ... scribe -v
//! ```
//!
//! Exit codes: 0 on clean shutdown, 1 when every integration failed,
//! 2 when startup configuration is invalid.

mod app;
mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use scribe_core::{config, Settings};

use crate::app::build_supervisor;
use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load environment variables from config directory first
    let env_path = config::env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    // Then local .env.local or .env
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_filter()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = match Settings::from_lookup(|key| {
        cli.env_override(key).or_else(|| std::env::var(key).ok())
    }) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };
    let settings = match &cli.state_dir {
        Some(dir) => settings.with_state_dir(dir),
        None => settings,
    };

    let mut supervisor = match build_supervisor(&settings) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!(error = %e, "Failed to start");
            return ExitCode::from(2);
        }
    };

    info!(state_dir = %settings.paths.root().display(), "Scribe starting");
    if let Err(e) = supervisor.run_until(shutdown_signal()).await {
        error!(error = %e, "Supervisor error");
        return ExitCode::from(1);
    }

    for (task, state) in supervisor.states().await {
        info!(task = %task, state = %state, "Final state");
    }

    if supervisor.all_failed().await {
        error!("Every integration failed");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
            return;
        }
        info!("Received SIGINT");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
