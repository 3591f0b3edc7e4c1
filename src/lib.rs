/// bikeshare_service: bike-share station metadata and occupancy snapshots.
///
/// # Module structure
///
/// ```text
/// bikeshare_service
/// ├── model      — shared data types (Station, StationStatus, StatusEntry, …)
/// ├── error      — BikeshareError taxonomy
/// ├── config     — service configuration loader (bikeshare.toml)
/// ├── logging    — tracing subscriber setup for the binary
/// ├── db         — PostgreSQL connection, validation and schema setup
/// ├── store
/// │   ├── pg     — repositories over PostgreSQL
/// │   └── memory — in-process repositories
/// ├── ingest
/// │   ├── realtime — realtime status JSON endpoint
/// │   ├── address  — station listing scraper (addresses)
/// │   └── fixtures (test only) — representative provider payloads
/// ├── reconcile  — update cycle: snapshot, station list, addresses
/// ├── report     — CSV time series and station detail projections
/// ├── import     — batch import of epoch-named snapshot files
/// ├── daemon     — scheduled update loop
/// └── endpoint   — HTTP API over the repositories
/// ```

/// Public modules
pub mod config;
pub mod daemon;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod import;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod store;

pub use error::{BikeshareError, Result};
