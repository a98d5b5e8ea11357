//! CLI entry point for the traffic tracking tool.
//!
//! Provides subcommands for registering locations, maintaining their sampling
//! rings, taking one-off readings, and running periodic sampling cycles.

mod infra;

use crate::infra::google::distance::GoogleMatrixClient;
use crate::infra::google::geocode::GoogleGeocodeClient;
use crate::infra::onwater::OnWaterClient;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use traffic_track::{
    config::Config,
    output::{append_record, print_report, ReadingRow},
    sampler::Sampler,
    store::{JsonStore, LocationStore},
};

const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Parser)]
#[command(name = "traffic_track")]
#[command(about = "Samples travel times around registered locations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a location and build its sampling ring
    Add {
        /// Display name, also the storage key
        #[arg(short, long)]
        name: String,

        /// Latitude of the center in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude of the center in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Fill in missing rings, surface flags, and countries
    Update,
    /// Sample one location and print its report, or sample and persist all
    Get {
        /// Sample just this location, printing instead of persisting
        #[arg(short, long)]
        name: Option<String>,

        /// CSV file to append the one-off reading to
        #[arg(short, long, requires = "name")]
        output: Option<String>,
    },
    /// Sample all locations on a fixed interval
    Run {
        /// Seconds between cycle starts
        #[arg(short, long, default_value_t = 3600)]
        interval: u64,

        /// Number of cycles to run (0 = infinite)
        #[arg(short, long, default_value_t = 0)]
        cycles: usize,

        /// Maximum number of concurrent location samples
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Drop all stored readings, keeping locations and their rings
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/traffic_track.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("traffic_track.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Add { name, lat, lng } => {
            let sampler = build_sampler(&config, DEFAULT_CONCURRENCY)?;
            sampler.add_location(&name, lat, lng).await?;
        }
        Commands::Update => {
            let sampler = build_sampler(&config, DEFAULT_CONCURRENCY)?;
            sampler.update_points().await?;
        }
        Commands::Get {
            name: Some(name),
            output,
        } => {
            let sampler = build_sampler(&config, DEFAULT_CONCURRENCY)?;
            match sampler.sample_by_name(&name).await? {
                Some(reading) => {
                    print_report(&name, &reading);
                    if let Some(path) = output {
                        append_record(&path, &ReadingRow::new(&name, &reading))?;
                    }
                }
                None => println!("no usable trips for '{name}' right now"),
            }
        }
        Commands::Get { name: None, .. } => {
            let sampler = build_sampler(&config, DEFAULT_CONCURRENCY)?;
            sampler.sample_all().await?;
        }
        Commands::Run {
            interval,
            cycles,
            concurrency,
        } => {
            let sampler = build_sampler(&config, concurrency)?;
            run_scheduler(sampler, interval, cycles).await?;
        }
        Commands::Refresh => {
            let store = JsonStore::new(&config.data_dir)?;
            let cleared = store.clear_readings().await?;
            info!(cleared, "Cleared readings from all locations");
        }
    }

    Ok(())
}

/// Wires the store and the provider adapters into a sampler. Provider keys
/// are demanded here, so store-only commands never need them.
fn build_sampler(config: &Config, concurrency: usize) -> Result<Sampler> {
    let store = Arc::new(JsonStore::new(&config.data_dir)?);
    let distance = Arc::new(GoogleMatrixClient::new(config.maps_api_key()?.to_string())?);
    let geocode = Arc::new(GoogleGeocodeClient::new(config.maps_api_key()?.to_string())?);
    let water = Arc::new(OnWaterClient::new(config.onwater_api_key()?.to_string())?);

    Ok(Sampler::new(
        store,
        distance,
        water,
        geocode,
        config.radius_km,
        concurrency,
    ))
}

/// Runs sampling cycles on a fixed interval. A cycle that overruns the
/// interval never stacks up behind the next tick.
#[tracing::instrument(skip(sampler), fields(interval_secs, cycles))]
async fn run_scheduler(sampler: Sampler, interval_secs: u64, cycles: usize) -> Result<()> {
    if cycles == 0 {
        info!(interval_secs, "Sampling indefinitely. Press Ctrl+C to stop.");
    } else {
        info!(interval_secs, cycles, "Starting sampling run");
    }

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut completed = 0usize;
    loop {
        interval.tick().await;
        completed += 1;

        info!(
            cycle = completed,
            total = if cycles == 0 { None } else { Some(cycles) },
            "Starting sampling cycle"
        );

        if let Err(e) = sampler.sample_all().await {
            error!(error = %e, "Sampling cycle failed");
        }

        if cycles > 0 && completed >= cycles {
            break;
        }
    }

    info!(completed, "Finished sampling run");
    Ok(())
}
