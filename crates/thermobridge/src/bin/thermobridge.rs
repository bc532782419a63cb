//! Thermobridge CLI
//!
//! Usage:
//!   thermobridge serve                  # HTTP gateway (+ scheduled ingest, MQTT if configured)
//!   thermobridge serve -l 127.0.0.1:80  # Override the listen address
//!   thermobridge ingest                 # Fetch and store one SMHI observation
//!   thermobridge -c config.yaml serve   # Load settings from YAML

use argh::FromArgs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use thermobridge::config::ServiceConfig;
use thermobridge::gateway::{self, AppState};
use thermobridge::ingest::{self, ObservationIngester};
use thermobridge::iot::{self, IotRecorder};
use thermobridge::store::ObjectStore;
use thermobridge::weather::{SmhiClient, WeatherSource};
use thermobridge::RecordStore;

/// Thermobridge - IoT and SMHI temperature gateway
#[derive(FromArgs)]
struct Args {
    /// path to a YAML configuration file (default: built-in defaults)
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Serve(ServeArgs),
    Ingest(IngestArgs),
}

/// Run the HTTP gateway
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// listen address, overrides the config file (e.g. 127.0.0.1:8080)
    #[argh(option, short = 'l')]
    listen: Option<String>,
}

/// Fetch the latest SMHI observation and store it once
#[derive(FromArgs)]
#[argh(subcommand, name = "ingest")]
struct IngestArgs {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();

    match &args.config {
        Some(path) => log::info!("Loading config from: {}", path.display()),
        None => log::info!("No config file specified, using defaults"),
    }
    let mut config = ServiceConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Serve(serve_args) => {
            if let Some(listen) = serve_args.listen {
                config.listen = listen;
            }
            serve(config).await
        }
        Command::Ingest(_) => ingest_once(config).await,
    }
}

async fn open_records(config: &ServiceConfig) -> anyhow::Result<RecordStore> {
    let backend = config.build_store().await?;
    log::info!("Object store: {}", backend.describe());
    Ok(RecordStore::new(backend, config.fetch.clone()))
}

fn weather_ingester(
    config: &ServiceConfig,
    records: RecordStore,
) -> anyhow::Result<ObservationIngester> {
    let source = SmhiClient::new(&config.weather)?;
    log::info!("Weather source: {}", source.describe());
    Ok(ObservationIngester::new(
        Arc::new(source),
        records,
        config.partitions.weather.clone(),
    ))
}

async fn ingest_once(config: ServiceConfig) -> anyhow::Result<()> {
    let records = open_records(&config).await?;
    let ingester = weather_ingester(&config, records)?;
    let report = ingester.ingest_once().await?;
    println!("{}", report.key);
    Ok(())
}

async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let records = open_records(&config).await?;
    let ingester = weather_ingester(&config, records.clone())?;

    // Graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down gracefully...");
        let _ = shutdown_tx.send(());
    })?;

    let mut tasks = Vec::new();

    if let Some(schedule) = config.ingest.schedule.clone() {
        let ingester = ingester.clone();
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = ingest::run_schedule(ingester, schedule, shutdown).await {
                log::error!("[Ingest] scheduler stopped: {}", e);
            }
        }));
    }

    if let Some(mqtt) = config.mqtt.clone() {
        let recorder = IotRecorder::new(records.clone(), config.partitions.iot.clone());
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = iot::run(recorder, mqtt, shutdown).await {
                log::error!("[MQTT] recorder stopped: {}", e);
            }
        }));
    }

    let state = Arc::new(AppState {
        records,
        partitions: config.partitions.clone(),
        auth: config.auth.clone(),
        ingester: Some(ingester),
    });
    if state.auth.compare.is_none() {
        log::warn!("No compare credentials configured; /compare will reject every request");
    }
    if state.auth.records.is_none() {
        log::warn!("No records credentials configured; /records will reject every request");
    }

    let listener = tokio::net::TcpListener::bind(config.listen.as_str()).await?;
    gateway::run_server(listener, state, shutdown_rx).await?;

    for task in tasks {
        if let Err(e) = task.await {
            log::error!("Background task failed: {}", e);
        }
    }

    log::info!("Thermobridge shut down, exiting");
    Ok(())
}
