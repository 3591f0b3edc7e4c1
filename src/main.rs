//! Bike-share Station Service
//!
//! Tracks station metadata and periodic occupancy snapshots for a
//! bike-share network:
//! 1. Polls the provider's realtime status API and stores each snapshot
//! 2. Keeps the station list (and scraped addresses) in sync
//! 3. Imports historical snapshot files
//! 4. Serves listings, detail, search and CSV exports over HTTP
//!
//! Usage:
//!   bikeshare init-db                      # Create tables
//!   bikeshare run                          # Update every poll interval
//!   bikeshare run --endpoint 8080          # ... with the HTTP endpoint on port 8080
//!   bikeshare serve --port 8080            # HTTP endpoint only
//!   bikeshare update                       # One update cycle
//!   bikeshare import --dir station_statuses
//!   bikeshare export --granularity 10 --output stations.csv
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string
//!   RUST_LOG     - tracing filter override

use bikeshare_service::config::{self, ServiceConfig};
use bikeshare_service::daemon::Daemon;
use bikeshare_service::endpoint::{self, Api};
use bikeshare_service::ingest::HttpUpstream;
use bikeshare_service::store::PgStore;
use bikeshare_service::{db, import, logging, reconcile, report};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bikeshare", version, about = "Bike-share station and occupancy tracker")]
struct Args {
    /// Configuration file (defaults apply when it doesn't exist)
    #[arg(long, global = true, value_name = "PATH", default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database tables if they don't exist
    InitDb,
    /// Run update cycles on the configured schedule
    Run {
        /// Also serve the HTTP endpoint on this port
        #[arg(long, value_name = "PORT")]
        endpoint: Option<u16>,
    },
    /// Serve the HTTP endpoint
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one full update cycle
    Update,
    /// Import snapshot files named by epoch seconds
    Import {
        /// Directory to import (defaults to status_directory from the config)
        #[arg(long, value_name = "PATH")]
        dir: Option<PathBuf>,
    },
    /// Write the downsampled bike-count time series as CSV
    Export {
        /// Keep every Nth snapshot (defaults to export_granularity from the config)
        #[arg(long)]
        granularity: Option<i64>,
        /// Output file (stdout when omitted)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = config::load_config(&args.config)?;

    match args.command {
        Command::InitDb => {
            let mut client = db::connect_with_validation()?;
            db::initialize_schema(&mut client)?;
        }
        Command::Run { endpoint } => {
            let store = PgStore::new(db::connect_and_verify()?);
            let upstream = HttpUpstream::new(&config)?;

            if let Some(port) = endpoint {
                spawn_endpoint(port, &config)?;
            }

            let mut daemon = Daemon::new(config, store, upstream);
            daemon.run()?;
        }
        Command::Serve { port } => {
            let store = PgStore::new(db::connect_and_verify()?);
            let upstream = HttpUpstream::new(&config)?;
            endpoint::start_endpoint_server(port, Api::new(store, upstream, config))?;
        }
        Command::Update => {
            let mut store = PgStore::new(db::connect_and_verify()?);
            let upstream = HttpUpstream::new(&config)?;
            let summary = reconcile::run_full_update_cycle(&mut store, &upstream, config.max_address_pages)?;
            tracing::info!(
                "Snapshot {} stored; {} stations, {} addresses",
                summary.snapshot_id,
                summary.stations,
                summary.addresses
            );
        }
        Command::Import { dir } => {
            let mut store = PgStore::new(db::connect_and_verify()?);
            let dir = dir.unwrap_or_else(|| config.status_directory.clone());
            let summary = import::import_directory(&mut store, &dir)?;
            tracing::info!("{} snapshots stored", summary.total);
        }
        Command::Export { granularity, output } => {
            let mut store = PgStore::new(db::connect_and_verify()?);
            let granularity = granularity.unwrap_or(config.export_granularity);
            let rows = match output {
                Some(path) => {
                    report::write_time_series(&mut store, granularity, &mut BufWriter::new(File::create(&path)?))?
                }
                None => report::write_time_series(&mut store, granularity, &mut io::stdout().lock())?,
            };
            tracing::info!("Exported {} rows", rows);
        }
    }

    Ok(())
}

/// Serve the endpoint from a background thread on its own connection.
fn spawn_endpoint(port: u16, config: &ServiceConfig) -> Result<(), Box<dyn Error>> {
    let store = PgStore::new(db::connect_and_verify()?);
    let upstream = HttpUpstream::new(config)?;
    let api = Api::new(store, upstream, config.clone());

    std::thread::spawn(move || {
        if let Err(e) = endpoint::start_endpoint_server(port, api) {
            tracing::error!("Endpoint server error: {}", e);
        }
    });

    Ok(())
}
