//! CvForge command-line client
//!
//! Drives the API access layer from a terminal: sign in, upload a CV and
//! run a rewrite job with progress output.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cvforge_app::{commands, AppContext, CommandError};
use cvforge_core::{JobObserver, SessionListener};
use cvforge_domain::{JobProgress, RewriteRequest};
use cvforge_infra::{config, observability};
use tokio_util::sync::CancellationToken;

/// CvForge - resilient client for the CV builder backend
#[derive(Parser, Debug)]
#[command(name = "cvforge", version, about)]
struct Cli {
    /// Path to a configuration file (defaults to env vars, then probing)
    #[arg(short, long, env = "CVFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current session state
    Status,
    /// Sign in and persist the credential pair
    Login {
        username: String,
        #[arg(long, env = "CVFORGE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear the persisted session
    Logout,
    /// Upload a CV document
    Upload { file: PathBuf },
    /// Rewrite a parsed CV (JSON) against a job description
    Rewrite {
        cv: PathBuf,
        #[arg(long)]
        job_description: Option<String>,
        #[arg(long)]
        cv_id: Option<String>,
    },
}

struct LoginPrompt;

impl SessionListener for LoginPrompt {
    fn on_session_expired(&self) {
        tracing::warn!("Session expired, run `cvforge login` to sign in again");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => config::load_from_file(Some(path))?,
        None => config::load()?,
    };
    observability::init_tracing(&config.logging)?;
    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env"),
        Err(err) if err.not_found() => tracing::debug!("No .env file found"),
        Err(err) => tracing::warn!(error = %err, "Failed to load .env"),
    }

    let ctx = AppContext::new(config).await?;
    ctx.on_session_expired(Arc::new(LoginPrompt));

    if let Err(err) = run(&ctx, cli.command).await {
        tracing::error!(error = %err, "Command failed");
        anyhow::bail!(err.user_message());
    }
    Ok(())
}

async fn run(ctx: &AppContext, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Status => print_json(&commands::session_status(ctx)),
        Command::Login { username, password } => {
            print_json(&commands::login(ctx, &username, &password).await?)
        }
        Command::Logout => print_json(&commands::logout(ctx).await?),
        Command::Upload { file } => {
            let receipt = commands::upload_cv(ctx, &file, |pct| eprintln!("upload {pct:>3}%")).await?;
            print_json(&receipt)
        }
        Command::Rewrite { cv, job_description, cv_id } => {
            let raw = std::fs::read_to_string(&cv)
                .map_err(|err| CommandError::Input(format!("Cannot read {}: {err}", cv.display())))?;
            let parsed = serde_json::from_str(&raw)
                .map_err(|err| CommandError::Input(format!("{} is not valid JSON: {err}", cv.display())))?;
            let request = RewriteRequest { cv: parsed, cv_id, job_description, instructions: None };

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let observer = |progress: &JobProgress| {
                let label = progress.stage.as_ref().map_or("working", |stage| stage.label.as_str());
                eprintln!("[{}/{}] {label}", progress.attempt, progress.max_attempts);
            };
            let report = commands::rewrite_cv(ctx, &request, Some(&observer as &dyn JobObserver), &cancel).await?;
            print_json(&report)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CommandError::Input(format!("Cannot render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
