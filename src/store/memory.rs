/// In-process repository backend.
///
/// Mirrors the PostgreSQL backend's ordering and matching rules so the
/// reconciler, report projector, importer and endpoint can be exercised
/// without a database.

use super::{ensure_positive, StationRepository, StatusRepository};
use crate::error::{BikeshareError, Result};
use crate::model::{Station, StationStatus};
use chrono::{DateTime, Utc};
use rand::seq::IteratorRandom;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    stations: BTreeMap<i32, Station>,
    statuses: Vec<StationStatus>,
    next_status_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots in ascending (timestamp, id) order.
    fn ordered_statuses(&self) -> Vec<&StationStatus> {
        let mut ordered: Vec<&StationStatus> = self.statuses.iter().collect();
        ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        ordered
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl StationRepository for MemoryStore {
    fn list_stations(&mut self, order_by_name: bool) -> Result<Vec<Station>> {
        let mut stations: Vec<Station> = self.stations.values().cloned().collect();
        if order_by_name {
            stations.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        }
        Ok(stations)
    }

    fn get_station(&mut self, id: i32) -> Result<Option<Station>> {
        Ok(self.stations.get(&id).cloned())
    }

    fn search_stations(&mut self, query: &str) -> Result<Vec<Station>> {
        let mut matches: Vec<Station> = self
            .stations
            .values()
            .filter(|s| {
                contains_ignore_case(&s.name, query)
                    || s.address.as_deref().is_some_and(|a| contains_ignore_case(a, query))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(matches)
    }

    fn replace_all(&mut self, stations: &[Station]) -> Result<()> {
        for station in stations {
            self.stations.remove(&station.id);
            self.stations.insert(station.id, station.clone());
        }
        Ok(())
    }

    fn random_station(&mut self) -> Result<Station> {
        self.stations
            .values()
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| BikeshareError::NotFound("no stations recorded yet".to_string()))
    }

    fn find_by_name(&mut self, name: &str) -> Result<Option<Station>> {
        Ok(self.stations.values().find(|s| s.name == name).cloned())
    }

    fn update_address(&mut self, id: i32, address: &str) -> Result<()> {
        let station = self
            .stations
            .get_mut(&id)
            .ok_or_else(|| BikeshareError::NotFound(format!("station {}", id)))?;
        station.address = Some(address.to_string());
        Ok(())
    }
}

impl StatusRepository for MemoryStore {
    fn append_status(&mut self, data: &Value, timestamp: DateTime<Utc>) -> Result<StationStatus> {
        self.next_status_id += 1;
        let status = StationStatus {
            id: self.next_status_id,
            timestamp,
            data: data.clone(),
        };
        self.statuses.push(status.clone());
        Ok(status)
    }

    fn append_batch(&mut self, snapshots: &[(Value, DateTime<Utc>)]) -> Result<usize> {
        for (data, timestamp) in snapshots {
            self.append_status(data, *timestamp)?;
        }
        Ok(snapshots.len())
    }

    fn status_exists(&mut self, timestamp: DateTime<Utc>) -> Result<bool> {
        Ok(self.statuses.iter().any(|s| s.timestamp == timestamp))
    }

    fn latest_status(&mut self) -> Result<Option<StationStatus>> {
        Ok(self.ordered_statuses().last().map(|s| (*s).clone()))
    }

    fn recent_statuses(&mut self, limit: i64) -> Result<Vec<StationStatus>> {
        ensure_positive("limit", limit)?;
        Ok(self
            .ordered_statuses()
            .into_iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn downsampled_statuses(&mut self, granularity: i64) -> Result<Vec<StationStatus>> {
        ensure_positive("granularity", granularity)?;
        Ok(self
            .ordered_statuses()
            .into_iter()
            .zip(1i64..)
            .filter(|(_, ordinal)| ordinal % granularity == 0)
            .map(|(status, _)| status.clone())
            .collect())
    }

    fn status_count(&mut self) -> Result<i64> {
        Ok(self.statuses.len() as i64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
