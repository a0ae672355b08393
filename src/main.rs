mod config;
mod footprint;
mod markers;
mod scheduler;
mod telemetry;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::config::{Config, ConfigError};
use crate::footprint::{FootprintCycle, PinholeFootprint};
use crate::markers::{MarkerError, MarkerLifecycleManager, MarkerStyle, PlaneteClient};
use crate::scheduler::CadenceScheduler;
use crate::telemetry::{MqttTransport, SnapshotStore, TelemetryError, TelemetryIngestor};

const TRANSPORT_SHUTDOWN: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "groundmark")]
#[command(about = "Live camera ground footprints from aircraft telemetry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate { config: String },
    /// Ingest telemetry and publish footprints until Ctrl-C
    Run {
        config: String,
        /// Write the log to this file instead of stderr
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Publish a synthetic flight on the telemetry topics
    Simulate {
        config: String,
        /// Messages per second on each topic
        #[arg(long, default_value_t = 100.0)]
        rate: f64,
    },
}

#[derive(Debug, Error)]
enum RunError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Telemetry(#[from] TelemetryError),
    #[error("marker service: {0}")]
    Marker(#[from] MarkerError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Run { config, log_file } => run(&config, log_file.as_deref()),
        Commands::Simulate { config, rate } => simulate(&config, rate),
    }
}

fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = std::fs::File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn load(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("Error loading {}: {}", path, e);
            None
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load(path) else {
        return ExitCode::FAILURE;
    };

    println!("Configuration is valid");
    println!(
        "  broker: {}:{} ({} topics, {:?} endian)",
        config.telemetry.host,
        config.telemetry.port,
        config.telemetry.topics.len(),
        config.telemetry.byte_order
    );
    println!("  period: {:?}", config.schedule.period);
    println!("  ground clearance: {} m", config.footprint.min_altitude_m);
    if config.markers.enabled {
        println!(
            "  markers: {} mission {} (window {:?})",
            config.markers.base_url, config.markers.mission_id, config.markers.eviction_window
        );
    } else {
        println!("  markers: disabled");
    }
    if config.history.enabled {
        println!("  history: {}", config.history.output_dir.display());
    } else {
        println!("  history: disabled");
    }
    ExitCode::SUCCESS
}

fn run(path: &str, log_file: Option<&Path>) -> ExitCode {
    let Some(config) = load(path) else {
        return ExitCode::FAILURE;
    };
    if let Err(e) = init_logging(log_file) {
        eprintln!("Error opening log file: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_pipeline(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_pipeline(config: Config) -> Result<(), RunError> {
    let mut scheduler = CadenceScheduler::new(config.schedule.period);
    let store = Arc::new(SnapshotStore::new());

    let mut cycle = FootprintCycle::new(
        store.clone(),
        Box::new(PinholeFootprint::new(&config.footprint)),
        config.footprint.min_altitude_m,
    );

    if config.markers.enabled {
        let credentials = config.markers.credentials()?;
        let client = PlaneteClient::new(&config.markers, credentials)?;
        let markers = MarkerLifecycleManager::new(
            Box::new(client),
            MarkerStyle::from(&config.markers),
            config.markers.eviction_window,
            config.markers.retry,
        );
        markers.acquire_token().await?;
        log::info!(
            "marker service {} reachable for mission {}",
            config.markers.base_url,
            config.markers.mission_id
        );
        cycle = cycle.with_markers(markers);
    }

    if config.history.enabled {
        cycle = cycle.with_history(config.history.output_dir.clone());
    }

    let transport = MqttTransport::connect(&config.telemetry).await?;
    let mqtt = transport.client();
    let ingestor = TelemetryIngestor::new(store, config.telemetry.byte_order);
    let transport_task = tokio::spawn(transport.run(ingestor));

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("interrupt received, shutting down");
                let _ = stop_tx.send(());
            }
            Err(e) => {
                log::error!("cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    log::info!("running every {:?}", config.schedule.period);
    scheduler.run(&mut cycle, stop_rx).await;

    if let Err(e) = mqtt.disconnect().await {
        log::warn!("broker disconnect failed: {}", e);
    }
    if tokio::time::timeout(TRANSPORT_SHUTDOWN, transport_task)
        .await
        .is_err()
    {
        log::warn!("transport did not stop within {:?}", TRANSPORT_SHUTDOWN);
    }
    Ok(())
}

fn simulate(path: &str, rate: f64) -> ExitCode {
    let Some(config) = load(path) else {
        return ExitCode::FAILURE;
    };
    if let Err(e) = telemetry::publish_period(rate) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = init_logging(None) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result: Result<(), RunError> = runtime.block_on(async {
        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = stop_tx.send(());
            } else {
                std::future::pending::<()>().await;
            }
        });
        telemetry::run_simulator(&config.telemetry, rate, stop_rx).await?;
        Ok(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
