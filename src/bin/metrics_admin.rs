//! # Metrics Admin CLI
//!
//! Command-line tool for inspecting and operating the portal metrics cache.
//!
//! Usage:
//!   metrics-admin dashboard --client <id> <website_id>
//!   metrics-admin refresh --client <id> <website_id>
//!   metrics-admin quota <website_id>
//!   metrics-admin clear-cache <website_id> [--kind uptime|performance]
//!   metrics-admin websites --client <id>
//!   metrics-admin add-website --client <id> --name <name> --url <url> [--monitor <id>]
//!   metrics-admin prune-log [--older-than-hours N]

use clap::{Parser, Subcommand};
use log::info;
use portal_metrics::storage::NewWebsite;
use portal_metrics::{MetricKind, MetricsConfig, MetricsService, RefreshOutcome};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "metrics-admin")]
#[command(about = "Inspect and operate the portal metrics cache", long_about = None)]
struct Cli {
    /// Path to the portal database (overrides PORTAL_DATABASE_PATH)
    #[arg(short, long, env = "PORTAL_DATABASE_PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lazy dashboard read (serves cache when fresh)
    Dashboard {
        /// Client requesting the dashboard
        #[arg(short, long)]
        client: i64,

        website_id: i64,
    },

    /// Rate-limited forced refresh of every metric kind
    Refresh {
        /// Client triggering the refresh
        #[arg(short, long)]
        client: i64,

        website_id: i64,
    },

    /// Show refresh quota for a website
    Quota { website_id: i64 },

    /// Delete cached metrics for a website
    ClearCache {
        website_id: i64,

        /// Only clear one kind (uptime or performance)
        #[arg(short, long)]
        kind: Option<MetricKind>,
    },

    /// List a client's active websites
    Websites {
        #[arg(short, long)]
        client: i64,
    },

    /// Register a website for a client
    AddWebsite {
        #[arg(short, long)]
        client: i64,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        url: String,

        /// UptimeRobot monitor ID
        #[arg(short, long)]
        monitor: Option<String>,
    },

    /// Delete refresh-log entries older than the given age (never inside the window)
    PruneLog {
        #[arg(long, default_value_t = 24)]
        older_than_hours: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = MetricsConfig::from_env()?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    let service = MetricsService::from_config(&config)?;

    match cli.command {
        Commands::Dashboard { client, website_id } => {
            let view = service.dashboard(client, website_id).await?;
            print_json(&view)?;
        }

        Commands::Refresh { client, website_id } => {
            let outcome = service.refresh(client, website_id).await?;
            print_json(&outcome)?;
            if let RefreshOutcome::QuotaExceeded(_) = outcome {
                return Err("refresh quota exceeded".into());
            }
        }

        Commands::Quota { website_id } => {
            let status = service.limiter().can_refresh(website_id)?;
            print_json(&status)?;
        }

        Commands::ClearCache { website_id, kind } => {
            let removed = service.cache().delete(website_id, kind)?;
            info!(
                "Cleared {} cache row(s) for website {} ({})",
                removed,
                website_id,
                kind.map(|k| k.to_string()).unwrap_or_else(|| "all kinds".to_string())
            );
        }

        Commands::Websites { client } => {
            let sites = service.websites().list_for_client(client)?;
            print_json(&sites)?;
        }

        Commands::AddWebsite {
            client,
            name,
            url,
            monitor,
        } => {
            let site = service.websites().insert(NewWebsite {
                client_id: client,
                name,
                url,
                uptime_monitor_id: monitor,
            })?;
            print_json(&site)?;
        }

        Commands::PruneLog { older_than_hours } => {
            let age = chrono::Duration::hours(i64::from(older_than_hours));
            let removed = service.limiter().prune_expired(age)?;
            info!(
                "Pruned {} refresh-log entries older than {} hour(s)",
                removed, older_than_hours
            );
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
