//! k8s-pod-state CLI - evaluate pod events and send alerts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use monitor::{handle, load_events, Settings, TracingAudit};
use notify::{LogChannel, MessageSink, Notifier, SlackChannel};

/// k8s-pod-state - Alert on unhealthy Kubernetes pods and containers.
#[derive(Parser)]
#[command(name = "k8s-pod-state")]
#[command(about = "Evaluate Kubernetes pod events and send chat alerts")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate pod events and dispatch messages
    Check {
        /// Settings file (TOML)
        #[arg(long, short)]
        config: PathBuf,

        /// Pod events file (JSON array)
        #[arg(long, short)]
        events: PathBuf,

        /// Evaluation time (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<String>,

        /// Slack incoming webhook URL, overrides the settings file
        #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
        slack_webhook_url: Option<String>,

        /// Log messages instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the decoded status of each pod event
    Parse {
        /// Pod events file (JSON array)
        #[arg(long, short)]
        events: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("monitor=debug,podstate=debug,notify=debug,audit=info,info")
        } else {
            EnvFilter::new("info")
        }
    });

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }

    match cli.command {
        Commands::Check {
            config,
            events,
            now,
            slack_webhook_url,
            dry_run,
        } => check(config, events, now, slack_webhook_url, dry_run).await,
        Commands::Parse { events } => parse(&events),
    }
}

async fn check(
    config: PathBuf,
    events: PathBuf,
    now: Option<String>,
    slack_webhook_url: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let settings = Settings::load(&config)
        .with_context(|| format!("Failed to load settings from {}", config.display()))?;
    let events = load_events(&events)?;
    let now = match now {
        Some(now) => DateTime::parse_from_rfc3339(&now)
            .with_context(|| format!("Invalid --now timestamp: {now}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let webhook = slack_webhook_url.or_else(|| settings.slack_webhook_url.clone());
    let sink: Arc<dyn MessageSink> = match webhook {
        Some(url) if !dry_run => Arc::new(SlackChannel::new(url)),
        Some(_) => Arc::new(LogChannel::new()),
        None => {
            if !dry_run {
                warn!("No Slack webhook configured, logging messages instead");
            }
            Arc::new(LogChannel::new())
        }
    };
    info!(channel = sink.name(), events = events.len(), %now, "Checking pods");

    let ctx = settings.handler_context(Notifier::with_channels(vec![sink]), Arc::new(TracingAudit))?;
    let status = handle(&ctx, &events, now).await;

    if status.hidden {
        println!("{} {}", "✓".green().bold(), status.reason);
    } else if status.is_success() {
        println!("{} {}", "!".yellow().bold(), status.reason);
    } else {
        println!("{} {}", "✗".red().bold(), status.reason);
    }

    if !status.is_success() {
        std::process::exit(i32::try_from(status.code).unwrap_or(i32::MAX));
    }
    Ok(())
}

fn parse(events: &Path) -> Result<()> {
    let events = load_events(events)?;
    let mut failed = 0;

    for event in &events {
        match event.snapshot() {
            Ok(snapshot) => {
                println!("{}", event.slug().bold());
                println!("{}", serde_json::to_string_pretty(&snapshot.status)?);
            }
            Err(e) => {
                failed += 1;
                println!("{} {}: {e}", "✗".red().bold(), event.slug());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} pod statuses failed to parse", events.len());
    }
    Ok(())
}
