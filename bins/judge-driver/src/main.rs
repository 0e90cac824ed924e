mod backend;
mod comparator;
mod config;
mod docker;
mod error;
mod executor;
mod process;
mod report;
mod runner;
mod suite;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{BackendConfigManager, DEFAULT_BACKEND, DEFAULT_CONFIG_PATH};
use judge_common::config::{DriverSettings, DRIVER_ID};
use judge_common::types::{ComparisonPolicy, ErrorReport, Submission};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "judge-driver")]
#[command(
    about = "Judge driver - run a submitted function against its test cases",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge a submission and print the verdict document
    Run {
        /// Submission JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        submission: String,

        /// Backend name from the backend config (defaults to $JUDGE_BACKEND or python)
        #[arg(short, long)]
        backend: Option<String>,

        /// Backend config file (defaults to $JUDGE_CONFIG or config/backends.json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Maximum number of test cases executing at once
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        concurrency: Option<u64>,

        /// Per-case timeout in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_ms: Option<u64>,

        /// Output comparator: exact, trimmed, json, float[:eps]
        #[arg(long)]
        comparator: Option<ComparisonPolicy>,

        /// Pretty-print the verdict
        #[arg(long, default_value = "false")]
        pretty: bool,
    },

    /// List configured backends
    Backends {
        /// Backend config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            submission,
            backend,
            config,
            concurrency,
            timeout_ms,
            comparator,
            pretty,
        } => {
            let overrides = Overrides { concurrency, timeout_ms, comparator };
            match run(&submission, backend, config, overrides, pretty).await {
                Ok(()) => {}
                Err(e) => {
                    error!(error = %format!("{:#}", e), "Judge run aborted");
                    let report = ErrorReport::new(
                        format!("{:#}", e),
                        DRIVER_ID,
                        chrono::Utc::now().timestamp(),
                    );
                    println!("{}", serde_json::to_string(&report)?);
                    std::process::exit(1);
                }
            }
        }
        Commands::Backends { config } => {
            let manager = load_backends(config)?;
            for backend in manager.list_backends() {
                println!(
                    "{:<20} {:<8} {} {}",
                    backend.name,
                    format!("{:?}", backend.kind).to_lowercase(),
                    backend.image.as_deref().unwrap_or("-"),
                    std::iter::once(backend.command.as_str())
                        .chain(backend.args.iter().map(String::as_str))
                        .collect::<Vec<_>>()
                        .join(" ")
                );
            }
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries the verdict document
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct Overrides {
    concurrency: Option<u64>,
    timeout_ms: Option<u64>,
    comparator: Option<ComparisonPolicy>,
}

async fn run(
    submission_path: &str,
    backend_name: Option<String>,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    pretty: bool,
) -> Result<()> {
    let submission = read_submission(submission_path)?;

    let manager = load_backends(config_path)?;
    let backend_name = backend_name
        .or_else(|| std::env::var("JUDGE_BACKEND").ok())
        .unwrap_or_else(|| DEFAULT_BACKEND.to_string());
    let backend_config = manager.get_config(&backend_name)?;
    let backend = backend::from_config(backend_config)?;

    info!(
        backend = %backend_name,
        kind = ?backend_config.kind,
        driver = DRIVER_ID,
        "Backend ready"
    );

    // Flags beat the submission, which beats the environment
    let mut settings = DriverSettings::from_env()?.with_submission_overrides(&submission)?;
    if let Some(concurrency) = overrides.concurrency {
        settings.concurrency = usize::try_from(concurrency).unwrap_or(usize::MAX);
    }
    if let Some(timeout_ms) = overrides.timeout_ms {
        settings.timeout_ms = timeout_ms;
    }
    if let Some(comparison) = overrides.comparator {
        settings.comparison = comparison;
    }
    let submission = Submission {
        timeout_ms: Some(settings.timeout_ms),
        comparator: Some(settings.comparison.clone()),
        ..submission
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling suite...");
            on_ctrl_c.cancel();
        }
    });

    let verdict = executor::judge(&submission, backend, &settings, DRIVER_ID, &cancel).await?;

    println!("{}", verdict.to_json(pretty)?);
    Ok(())
}

fn read_submission(path: &str) -> Result<Submission> {
    let content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read submission from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read submission {}", path))?
    };

    serde_json::from_str(&content).context("Failed to parse submission")
}

fn load_backends(config_path: Option<PathBuf>) -> Result<BackendConfigManager> {
    let path = config_path
        .or_else(|| std::env::var("JUDGE_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    BackendConfigManager::load(Path::new(&path))
}
