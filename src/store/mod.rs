/// Repository traits for stations and status snapshots.
///
/// Callers receive a repository handle explicitly and own it for the
/// duration of one request or cycle; there is no process-wide session.
///
/// - `pg`     — production backend over `postgres::Client`
/// - `memory` — in-process backend with identical semantics

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use crate::error::Result;
use crate::model::{Station, StationStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// CRUD and ordered/filtered reads over station records.
pub trait StationRepository {
    /// All stations, name-sorted when `order_by_name`, otherwise by id.
    fn list_stations(&mut self, order_by_name: bool) -> Result<Vec<Station>>;

    fn get_station(&mut self, id: i32) -> Result<Option<Station>>;

    /// Case-insensitive substring match against name or address.
    fn search_stations(&mut self, query: &str) -> Result<Vec<Station>>;

    /// For each station, deletes any row with the same id and inserts the
    /// new one. Fields not carried by `stations` (such as a previously
    /// scraped address) are dropped along with the old row.
    fn replace_all(&mut self, stations: &[Station]) -> Result<()>;

    /// # Errors
    /// `BikeshareError::NotFound` if there are no stations.
    fn random_station(&mut self) -> Result<Station>;

    /// Exact name match; the lowest id wins if the provider reuses a name.
    fn find_by_name(&mut self, name: &str) -> Result<Option<Station>>;

    /// # Errors
    /// `BikeshareError::NotFound` if no station has this id.
    fn update_address(&mut self, id: i32, address: &str) -> Result<()>;
}

/// Append-only store of timestamped status snapshots.
pub trait StatusRepository {
    fn append_status(&mut self, data: &Value, timestamp: DateTime<Utc>) -> Result<StationStatus>;

    /// Appends several snapshots atomically.
    fn append_batch(&mut self, snapshots: &[(Value, DateTime<Utc>)]) -> Result<usize>;

    fn status_exists(&mut self, timestamp: DateTime<Utc>) -> Result<bool>;

    fn latest_status(&mut self) -> Result<Option<StationStatus>>;

    /// Newest first, at most `limit` snapshots.
    fn recent_statuses(&mut self, limit: i64) -> Result<Vec<StationStatus>>;

    /// Every `granularity`-th snapshot in ascending timestamp order: rows
    /// are numbered from 1 by timestamp and kept when the number divides
    /// evenly by `granularity`.
    fn downsampled_statuses(&mut self, granularity: i64) -> Result<Vec<StationStatus>>;

    /// Same rows as `downsampled_statuses`, handed to `visit` one at a time
    /// so an export never holds the whole series. Returns the row count.
    fn for_each_downsampled_status(
        &mut self,
        granularity: i64,
        visit: &mut dyn FnMut(StationStatus) -> Result<()>,
    ) -> Result<usize> {
        let statuses = self.downsampled_statuses(granularity)?;
        let count = statuses.len();
        for status in statuses {
            visit(status)?;
        }
        Ok(count)
    }

    fn status_count(&mut self) -> Result<i64>;
}

/// Rejects strides and limits below 1 before they reach a backend.
pub(crate) fn ensure_positive(name: &str, value: i64) -> Result<()> {
    if value < 1 {
        return Err(crate::error::BikeshareError::InvalidArgument(format!(
            "{} must be at least 1, got {}",
            name, value
        )));
    }
    Ok(())
}
