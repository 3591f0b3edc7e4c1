/// Scheduled update daemon
///
/// Runs one full update cycle per poll interval. A failed cycle is logged
/// and counted; the next attempt waits for the following tick, so there
/// is no retry inside an interval.

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::ingest::Upstream;
use crate::reconcile::{self, UpdateSummary};
use crate::store::{StationRepository, StatusRepository};
use chrono::Utc;

// ---------------------------------------------------------------------------
// Daemon State
// ---------------------------------------------------------------------------

/// Main daemon state
pub struct Daemon<S, U> {
    config: ServiceConfig,
    store: S,
    upstream: U,
    consecutive_failures: u32,
    last_success: Option<UpdateSummary>,
}

impl<S, U> Daemon<S, U>
where
    S: StationRepository + StatusRepository,
    U: Upstream,
{
    pub fn new(config: ServiceConfig, store: S, upstream: U) -> Self {
        Self {
            config,
            store,
            upstream,
            consecutive_failures: 0,
            last_success: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success(&self) -> Option<&UpdateSummary> {
        self.last_success.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Run one update cycle and record its outcome.
    pub fn tick(&mut self) -> Result<UpdateSummary> {
        match reconcile::run_full_update_cycle(&mut self.store, &self.upstream, self.config.max_address_pages) {
            Ok(summary) => {
                self.consecutive_failures = 0;
                self.last_success = Some(summary.clone());
                Ok(summary)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                Err(e)
            }
        }
    }

    /// Main daemon loop (runs indefinitely)
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            "Starting daemon loop: one update cycle every {} minute(s)",
            self.config.poll_interval_minutes
        );

        loop {
            let start = Utc::now();

            match self.tick() {
                Ok(summary) => tracing::info!(
                    "Update complete: snapshot {}, {} stations, {} addresses",
                    summary.snapshot_id,
                    summary.stations,
                    summary.addresses
                ),
                Err(e) => tracing::error!(
                    "Update cycle failed ({} in a row): {}",
                    self.consecutive_failures,
                    e
                ),
            }

            // Sleep until next poll interval
            let elapsed = (Utc::now() - start).num_seconds();
            let sleep_seconds = (self.config.poll_interval_minutes * 60) as i64 - elapsed;

            if sleep_seconds > 0 {
                std::thread::sleep(std::time::Duration::from_secs(sleep_seconds as u64));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
