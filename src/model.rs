/// Core data types for the bike-share station service.
///
/// Stations and status snapshots are only related by name: a snapshot is
/// the verbatim upstream payload for every station at one instant, and a
/// station's readings are found by matching `stationName` inside it.

use crate::error::{BikeshareError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// Bike rental station.
///
/// `id` is assigned by the provider and never generated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: i32,
    pub name: String,
    /// Filled in by the address scrape; lost whenever the station row is
    /// replaced by a reconciliation cycle until the scrape runs again.
    pub address: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub rack_count: i32,
    pub in_service: bool,
}

/// Station status at a given time: one snapshot of every station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationStatus {
    pub id: i32,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl StationStatus {
    /// Projects the stored payload into typed per-station entries.
    ///
    /// # Errors
    /// `BikeshareError::Parse` if `realtimeList` is missing or an entry
    /// lacks a station name.
    pub fn entries(&self) -> Result<Vec<StatusEntry>> {
        parse_payload(&self.data).map(|p| p.realtime_list)
    }
}

// ---------------------------------------------------------------------------
// Upstream payload projection
// ---------------------------------------------------------------------------

/// Realtime status payload as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimePayload {
    #[serde(rename = "realtimeList")]
    pub realtime_list: Vec<StatusEntry>,
}

/// One element of `realtimeList`.
///
/// The provider is inconsistent about sending numbers as JSON strings or
/// numbers, so every scalar is kept as text and parsed where it's used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    #[serde(rename = "stationId", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(rename = "stationName")]
    pub station_name: String,
    #[serde(rename = "stationLongitude", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    #[serde(rename = "stationLatitude", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(rename = "rackTotCnt", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub rack_count: Option<String>,
    #[serde(rename = "stationUseYn", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub use_flag: Option<String>,
    #[serde(rename = "parkingBikeTotCnt", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub parked_bikes: Option<String>,
    /// Any other keys the provider sends (shared bikes, dock status, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One station's entry at one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReading {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: StatusEntry,
}

/// Parses a realtime payload held as a JSON value.
pub fn parse_payload(data: &Value) -> Result<RealtimePayload> {
    RealtimePayload::deserialize(data)
        .map_err(|e| BikeshareError::Parse(format!("unexpected realtime payload shape: {}", e)))
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
