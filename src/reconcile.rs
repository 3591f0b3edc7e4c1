/// Reconciliation of the local station list with the provider.
///
/// One update cycle:
/// 1. Fetch the realtime status payload (abort on failure, nothing written)
/// 2. Build stations from it (abort on a malformed entry, nothing written)
/// 3. Append the payload as a new status snapshot
/// 4. Replace every station row carried by the payload
/// 5. Page through the station listing and attach addresses by name
///
/// Addresses are matched against the station list written in step 4, so
/// the order of steps 4 and 5 matters.

use crate::error::{BikeshareError, Result};
use crate::ingest::Upstream;
use crate::model::{parse_payload, Station, StatusEntry};
use crate::store::{StationRepository, StatusRepository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Outcome of one full update cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateSummary {
    pub snapshot_id: i32,
    pub timestamp: DateTime<Utc>,
    pub stations: usize,
    pub addresses: usize,
}

// ---------------------------------------------------------------------------
// Payload -> stations
// ---------------------------------------------------------------------------

/// Maps every `realtimeList` entry into a `Station` with no address.
///
/// # Errors
/// `BikeshareError::Parse` if the payload has no station list, or if any
/// entry has a missing or malformed id, coordinate or rack count.
pub fn build_stations_from_status(status: &Value) -> Result<Vec<Station>> {
    parse_payload(status)?
        .realtime_list
        .iter()
        .map(station_from_entry)
        .collect()
}

fn station_from_entry(entry: &StatusEntry) -> Result<Station> {
    let raw_id = entry.station_id.as_deref().ok_or_else(|| {
        BikeshareError::Parse(format!("station '{}' has no stationId", entry.station_name))
    })?;

    Ok(Station {
        id: parse_station_id(raw_id)?,
        name: entry.station_name.clone(),
        address: None,
        longitude: parse_field(&entry.station_name, "stationLongitude", entry.longitude.as_deref())?,
        latitude: parse_field(&entry.station_name, "stationLatitude", entry.latitude.as_deref())?,
        rack_count: parse_field(&entry.station_name, "rackTotCnt", entry.rack_count.as_deref())?,
        in_service: entry.use_flag.as_deref() == Some("Y"),
    })
}

/// Extracts the numeric id from the provider's `"<prefix>-<digits>"` form.
/// The id is the second `-`-separated segment; anything after it is ignored.
///
/// # Example
/// ```
/// use bikeshare_service::reconcile::parse_station_id;
/// assert_eq!(parse_station_id("ST-101").unwrap(), 101);
/// assert_eq!(parse_station_id("ST-12-3").unwrap(), 12);
/// assert!(parse_station_id("101").is_err());
/// ```
pub fn parse_station_id(raw: &str) -> Result<i32> {
    let suffix = raw.split('-').nth(1).ok_or_else(|| {
        BikeshareError::Parse(format!("stationId '{}' has no '-' separator", raw))
    })?;

    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BikeshareError::Parse(format!(
            "stationId '{}' has no numeric id after the prefix",
            raw
        )));
    }

    suffix
        .parse()
        .map_err(|e| BikeshareError::Parse(format!("stationId '{}': {}", raw, e)))
}

fn parse_field<T>(station: &str, field: &str, raw: Option<&str>) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw.ok_or_else(|| {
        BikeshareError::Parse(format!("station '{}' has no {}", station, field))
    })?;

    raw.trim().parse().map_err(|e| {
        BikeshareError::Parse(format!("station '{}': bad {} '{}': {}", station, field, raw, e))
    })
}

// ---------------------------------------------------------------------------
// Reconciliation steps
// ---------------------------------------------------------------------------

/// Rebuilds station rows from a realtime payload. Returns the number of
/// stations written.
pub fn reconcile_station_list<S>(store: &mut S, status: &Value) -> Result<usize>
where
    S: StationRepository,
{
    let stations = build_stations_from_status(status)?;
    store.replace_all(&stations)?;
    tracing::info!("Station list reconciled: {} stations", stations.len());
    Ok(stations.len())
}

/// Pages through the station listing from page 1 until an empty page and
/// overwrites each named station's address. Returns the number of
/// addresses written.
///
/// # Errors
/// - `BikeshareError::NotFound` when a scraped name matches no station;
///   reconciliation halts there instead of skipping the row.
/// - `BikeshareError::Upstream` when a page fails or the listing does not
///   end within `max_pages`.
pub fn reconcile_addresses<S, U>(store: &mut S, upstream: &U, max_pages: u32) -> Result<usize>
where
    S: StationRepository,
    U: Upstream,
{
    let mut updated = 0;

    for page in 1..=max_pages {
        let rows = upstream.fetch_address_page(page)?;
        if rows.is_empty() {
            tracing::info!("Addresses reconciled: {} across {} pages", updated, page - 1);
            return Ok(updated);
        }

        tracing::debug!("Listing page {}: {} rows", page, rows.len());

        for row in rows {
            let station = store.find_by_name(&row.name)?.ok_or_else(|| {
                BikeshareError::NotFound(format!(
                    "listed station '{}' (page {}) matches no known station",
                    row.name, page
                ))
            })?;
            store.update_address(station.id, &row.address)?;
            updated += 1;
        }
    }

    Err(BikeshareError::Upstream(format!(
        "station listing did not end within {} pages",
        max_pages
    )))
}

/// Runs one full update cycle against `upstream`.
pub fn run_full_update_cycle<S, U>(store: &mut S, upstream: &U, max_address_pages: u32) -> Result<UpdateSummary>
where
    S: StationRepository + StatusRepository,
    U: Upstream,
{
    let status = upstream.fetch_realtime_status()?;
    let stations = build_stations_from_status(&status)?;

    let snapshot = store.append_status(&status, Utc::now())?;
    tracing::info!("Snapshot {} stored at {}", snapshot.id, snapshot.timestamp);

    store.replace_all(&stations)?;
    tracing::info!("Station list reconciled: {} stations", stations.len());

    let addresses = reconcile_addresses(store, upstream, max_address_pages)?;

    Ok(UpdateSummary {
        snapshot_id: snapshot.id,
        timestamp: snapshot.timestamp,
        stations: stations.len(),
        addresses,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
