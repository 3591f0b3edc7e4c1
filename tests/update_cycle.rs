/// Integration tests for the reconciliation cycle
///
/// Runs full update cycles against an in-memory store and a scripted
/// provider, covering the ordering and abort rules:
/// 1. A failed fetch or malformed payload writes nothing
/// 2. Station rows are replaced before addresses are matched by name
/// 3. An unknown scraped name halts address reconciliation
/// 4. The listing scrape stops at an empty page or the page bound

use bikeshare_service::ingest::{AddressRow, Upstream};
use bikeshare_service::reconcile::{reconcile_addresses, reconcile_station_list, run_full_update_cycle};
use bikeshare_service::store::{MemoryStore, StationRepository, StatusRepository};
use bikeshare_service::{BikeshareError, Result};
use serde_json::{json, Value};
use std::cell::Cell;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct ScriptedUpstream {
    status: Option<Value>,
    pages: Vec<Vec<AddressRow>>,
    pages_requested: Cell<u32>,
}

impl ScriptedUpstream {
    fn new(status: Value, pages: Vec<Vec<AddressRow>>) -> Self {
        Self {
            status: Some(status),
            pages,
            pages_requested: Cell::new(0),
        }
    }

    fn unavailable() -> Self {
        Self {
            status: None,
            pages: Vec::new(),
            pages_requested: Cell::new(0),
        }
    }
}

impl Upstream for ScriptedUpstream {
    fn fetch_realtime_status(&self) -> Result<Value> {
        self.status
            .clone()
            .ok_or_else(|| BikeshareError::Upstream("realtime status API error: 503".to_string()))
    }

    fn fetch_address_page(&self, page: u32) -> Result<Vec<AddressRow>> {
        self.pages_requested.set(self.pages_requested.get() + 1);
        Ok(self.pages.get(page as usize - 1).cloned().unwrap_or_default())
    }
}

fn entry(id: &str, name: &str, bikes: &str) -> Value {
    json!({
        "stationId": id,
        "stationName": name,
        "stationLongitude": "126.9",
        "stationLatitude": "37.5",
        "rackTotCnt": "15",
        "stationUseYn": "Y",
        "parkingBikeTotCnt": bikes
    })
}

fn row(name: &str, address: &str) -> AddressRow {
    AddressRow {
        name: name.to_string(),
        address: address.to_string(),
    }
}

fn two_station_status() -> Value {
    json!({ "realtimeList": [entry("ST-1", "Hangang Park", "3"), entry("ST-2", "City Hall", "8")] })
}

// ---------------------------------------------------------------------------
// Full cycle
// ---------------------------------------------------------------------------

#[test]
fn test_full_cycle_stores_snapshot_stations_and_addresses() {
    let upstream = ScriptedUpstream::new(
        two_station_status(),
        vec![
            vec![row("Hangang Park", "1 Riverside Rd")],
            vec![row("City Hall", "110 Sejong-daero")],
        ],
    );
    let mut store = MemoryStore::new();

    let summary = run_full_update_cycle(&mut store, &upstream, 10).unwrap();

    assert_eq!(summary.stations, 2);
    assert_eq!(summary.addresses, 2);
    assert_eq!(upstream.pages_requested.get(), 3, "pages 1, 2 and the empty page 3");

    assert_eq!(store.status_count().unwrap(), 1);
    let latest = store.latest_status().unwrap().unwrap();
    assert_eq!(latest.data, two_station_status(), "snapshot is stored verbatim");

    let city_hall = store.get_station(2).unwrap().unwrap();
    assert_eq!(city_hall.address.as_deref(), Some("110 Sejong-daero"));
}

#[test]
fn test_failed_fetch_writes_nothing() {
    let mut store = MemoryStore::new();

    let err = run_full_update_cycle(&mut store, &ScriptedUpstream::unavailable(), 10).unwrap_err();

    assert!(matches!(err, BikeshareError::Upstream(_)));
    assert_eq!(store.status_count().unwrap(), 0);
    assert!(store.list_stations(false).unwrap().is_empty());
}

#[test]
fn test_malformed_payload_writes_nothing() {
    let status = json!({ "realtimeList": [entry("ST-1", "Good", "1"), entry("42", "Bad", "1")] });
    let mut store = MemoryStore::new();

    let err = run_full_update_cycle(&mut store, &ScriptedUpstream::new(status, vec![]), 10).unwrap_err();

    assert!(matches!(err, BikeshareError::Parse(_)));
    assert_eq!(store.status_count().unwrap(), 0);
    assert!(store.list_stations(false).unwrap().is_empty());
}

#[test]
fn test_cycle_drops_then_restores_addresses() {
    let upstream = ScriptedUpstream::new(two_station_status(), vec![vec![row("Hangang Park", "1 Riverside Rd")]]);
    let mut store = MemoryStore::new();

    run_full_update_cycle(&mut store, &upstream, 10).unwrap();

    // Rebuilding from the payload alone loses the scraped address
    reconcile_station_list(&mut store, &two_station_status()).unwrap();
    assert_eq!(store.get_station(1).unwrap().unwrap().address, None);

    // A full cycle scrapes it back
    run_full_update_cycle(&mut store, &upstream, 10).unwrap();
    assert_eq!(store.get_station(1).unwrap().unwrap().address.as_deref(), Some("1 Riverside Rd"));
    assert_eq!(store.status_count().unwrap(), 2);
}

#[test]
fn test_station_set_unchanged_after_repeat_reconcile() {
    let mut store = MemoryStore::new();

    reconcile_station_list(&mut store, &two_station_status()).unwrap();
    let first = store.list_stations(false).unwrap();
    reconcile_station_list(&mut store, &two_station_status()).unwrap();

    assert_eq!(store.list_stations(false).unwrap(), first);
    assert_eq!(first.len(), 2);
}

// ---------------------------------------------------------------------------
// Address reconciliation
// ---------------------------------------------------------------------------

#[test]
fn test_unknown_scraped_name_halts_reconciliation() {
    let upstream = ScriptedUpstream::new(
        two_station_status(),
        vec![vec![row("Renamed Station", "9 Nowhere St"), row("City Hall", "110 Sejong-daero")]],
    );
    let mut store = MemoryStore::new();
    reconcile_station_list(&mut store, &two_station_status()).unwrap();

    let err = reconcile_addresses(&mut store, &upstream, 10).unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("Renamed Station"));
    assert_eq!(store.get_station(2).unwrap().unwrap().address, None, "later rows are not applied");
}

#[test]
fn test_listing_bounded_by_max_pages() {
    let pages = (0..5).map(|_| vec![row("City Hall", "110 Sejong-daero")]).collect();
    let upstream = ScriptedUpstream::new(two_station_status(), pages);
    let mut store = MemoryStore::new();
    reconcile_station_list(&mut store, &two_station_status()).unwrap();

    let err = reconcile_addresses(&mut store, &upstream, 3).unwrap_err();

    assert!(matches!(err, BikeshareError::Upstream(_)));
    assert_eq!(upstream.pages_requested.get(), 3);
}

#[test]
fn test_empty_first_page_updates_nothing() {
    let upstream = ScriptedUpstream::new(two_station_status(), vec![]);
    let mut store = MemoryStore::new();

    assert_eq!(reconcile_addresses(&mut store, &upstream, 10).unwrap(), 0);
    assert_eq!(upstream.pages_requested.get(), 1);
}
