//! Replica router command line.
//!
//! ```text
//! replica-router check --config router.toml [--json]
//!     Probe every configured backend once and print its status.
//!
//! replica-router watch --config router.toml
//!     Run the failover monitor until interrupted, logging transitions.
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use replica_router::config::load_config;
use replica_router::health::{CheckKind, ProbeOptions};
use replica_router::health::cache::LocalHealthCache;
use replica_router::lifecycle::{self, signals};
use replica_router::observability::{logging, metrics};
use replica_router::{BackendId, BackendProbe, HealthChecker, RouterConfig, TcpProbe};

#[derive(Parser)]
#[command(name = "replica-router")]
#[command(about = "Health tooling for the replica router", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every configured backend once
    Check {
        #[arg(short, long)]
        config: PathBuf,

        /// Print machine-readable output
        #[arg(long)]
        json: bool,
    },
    /// Run the failover monitor until Ctrl-C
    Watch {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct BackendStatus {
    backend: BackendId,
    database: String,
    alive: bool,
    writable: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let path = match &cli.command {
        Commands::Check { config, .. } | Commands::Watch { config } => config.clone(),
    };
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability.log_level);

    let result = match cli.command {
        Commands::Check { json, .. } => check(&config, json),
        Commands::Watch { .. } => watch(config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "replica-router failed");
            ExitCode::FAILURE
        }
    }
}

fn check(config: &RouterConfig, json: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let backends = replica_router::BackendSet::from_config(config);
    let probe: Arc<dyn BackendProbe> = Arc::new(TcpProbe::from_config(config));
    let checker = HealthChecker::new(probe, config.health.cache_scope);
    let opts = ProbeOptions::uncached(config.health.attempts);
    let mut records = LocalHealthCache::new();

    let mut statuses = Vec::new();
    for backend in backends.all_backends() {
        let alive = checker.probe_with(&mut records, &backend, CheckKind::Liveness, &opts)?;
        let writable = alive
            && checker.probe_with(&mut records, &backend, CheckKind::Writability, &opts)?;
        statuses.push(BackendStatus {
            database: backends.database_of(backend.as_str()).unwrap_or("-").to_string(),
            backend,
            alive,
            writable,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        println!("{:<24} {:<16} {:<6} WRITABLE", "BACKEND", "DATABASE", "ALIVE");
        for s in &statuses {
            println!("{:<24} {:<16} {:<6} {}", s.backend, s.database, s.alive, s.writable);
        }
    }

    let all_alive = statuses.iter().all(|s| s.alive);
    Ok(if all_alive { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn watch(mut config: RouterConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    config.monitor.enabled = true;
    let probe = Arc::new(TcpProbe::from_config(&config));
    let runtime = lifecycle::build(config, probe)?;

    signals::wait_for_shutdown().await;

    if runtime.shutdown().await {
        tracing::info!("Shutdown complete");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
