//! gymtrack - track workouts against the gym API from the terminal.
//!
//! Every command restores the saved session first, then runs with either
//! the signed-in or signed-out command set.

mod commands;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gymtrack_core::{ApiClient, Config, SessionManager, SessionStorage};

use commands::App;

#[derive(Debug, Parser)]
#[command(name = "gymtrack", version, about = "Track your workouts from the terminal")]
struct Cli {
    /// API base URL (overrides config and GYMTRACK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami {
        #[arg(long)]
        json: bool,
    },
    /// List muscle groups
    Groups,
    /// List exercises for a muscle group
    Exercises { group: String },
    /// Show exercise details
    Exercise { id: String },
    /// Mark an exercise as done
    Done { id: String },
    /// Show completed exercises by day
    History {
        #[arg(long)]
        json: bool,
    },
    /// Change your name and optionally your password
    Profile {
        #[arg(long)]
        name: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
    },
    /// Upload a new profile photo (jpg or png, up to 3 MB)
    Avatar { path: PathBuf },
}

/// Build the log subscriber: stderr always, plus a daily file in `log_dir`
/// when given. The file writer is flushed when the returned guard drops.
fn log_subscriber(
    filter: EnvFilter,
    log_dir: Option<PathBuf>,
) -> (impl tracing::Subscriber + Send + Sync + 'static, Option<WorkerGuard>) {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gymtrack.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter);
    (subscriber, guard)
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr (filtered by RUST_LOG, default "warn") and to a daily
/// file under the data directory when one is available.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let log_dir = config.data_dir().ok().map(|dir| dir.join("logs"));

    let (subscriber, guard) = log_subscriber(filter, log_dir);
    subscriber.init();
    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (mut config, config_error) = match Config::load() {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e)),
    };
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    let _guard = init_tracing(&config);
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(api_url = %config.api_url, storage = ?config.storage, "gymtrack starting");

    let api = ApiClient::with_timeout(&config.api_url, config.request_timeout())?;
    let storage = SessionStorage::new(config.open_store()?);
    let session = SessionManager::new(Arc::new(api.clone()), storage);
    session.restore().await;

    let mut app = App::new(config, api, session);
    // Returned rather than exiting so `_guard` drops and flushes the log file
    match app.run(cli.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", app.describe_error(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login_with_global_api_url() {
        let cli = Cli::try_parse_from(["gymtrack", "login", "--email", "a@b.com", "--api-url", "http://x"])
            .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://x"));
        assert!(matches!(cli.command, Command::Login { email: Some(ref e) } if e == "a@b.com"));
    }

    #[test]
    fn test_parse_profile_flags() {
        let cli = Cli::try_parse_from(["gymtrack", "profile", "--name", "Bia", "--password"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Profile { name: Some(ref n), password: true } if n == "Bia"
        ));
    }

    #[test]
    fn test_exercises_requires_group() {
        assert!(Cli::try_parse_from(["gymtrack", "exercises"]).is_err());
    }

    #[test]
    fn test_file_log_is_written_when_guard_drops() {
        let dir = tempfile::tempdir().unwrap();
        let (subscriber, guard) =
            log_subscriber(EnvFilter::new("info"), Some(dir.path().to_path_buf()));
        assert!(guard.is_some());

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(error = "boom", "Command failed");
        });
        drop(guard);

        let contents: String = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(contents.contains("Command failed"));
        assert!(contents.contains("boom"));
    }

    #[test]
    fn test_no_log_dir_means_no_guard() {
        let (_subscriber, guard) = log_subscriber(EnvFilter::new("warn"), None);
        assert!(guard.is_none());
    }
}
