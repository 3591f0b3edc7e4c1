/// Report projections over stations and downsampled snapshots.
///
/// Snapshots store every station's counts in one payload, so per-station
/// views are assembled by scanning each snapshot's entries for a name
/// match. That is O(stations) per lookup, which is fine for a single
/// city's network.

use crate::error::{BikeshareError, Result};
use crate::model::{Station, StationReading, StationStatus, StatusEntry};
use crate::store::{ensure_positive, StationRepository, StatusRepository};
use serde::Serialize;
use std::io::Write;

// ---------------------------------------------------------------------------
// Entry lookup
// ---------------------------------------------------------------------------

/// First entry named `station_name`, if any.
pub fn find_in_entries<'a>(station_name: &str, entries: &'a [StatusEntry]) -> Option<&'a StatusEntry> {
    entries.iter().find(|e| e.station_name == station_name)
}

/// The station's entry in `snapshot`, or `None` if the snapshot doesn't
/// mention it.
///
/// # Errors
/// `BikeshareError::Parse` only if the snapshot payload itself is malformed.
pub fn find_entry(station: &Station, snapshot: &StationStatus) -> Result<Option<StatusEntry>> {
    let entries = snapshot.entries()?;
    Ok(find_in_entries(&station.name, &entries).cloned())
}

// ---------------------------------------------------------------------------
// Time series export
// ---------------------------------------------------------------------------

/// Formats the export: a header, then one line per snapshot with the
/// epoch-seconds timestamp and each station's docked bike count.
///
/// Each line is complete including its trailing newline. A station missing
/// from a snapshot gets an empty cell.
pub struct TimeSeriesFormat {
    station_names: Vec<String>,
}

impl TimeSeriesFormat {
    /// Stations must already be in column order.
    pub fn new(stations: &[Station]) -> Self {
        Self {
            station_names: stations.iter().map(|s| s.name.clone()).collect(),
        }
    }

    pub fn header(&self) -> Result<String> {
        let mut record = vec!["timestamp"];
        record.extend(self.station_names.iter().map(String::as_str));
        csv_line(&record)
    }

    pub fn row(&self, snapshot: &StationStatus) -> Result<String> {
        let entries = snapshot.entries()?;

        let timestamp = snapshot.timestamp.timestamp().to_string();
        let mut record = vec![timestamp.as_str()];
        for name in &self.station_names {
            let count = find_in_entries(name, &entries).and_then(|e| e.parked_bikes.as_deref());
            record.push(count.unwrap_or(""));
        }
        csv_line(&record)
    }
}

/// One CSV record, quoted where needed, as a newline-terminated line.
fn csv_line(record: &[&str]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(record)?;
    let bytes = writer.into_inner().map_err(|e| BikeshareError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| BikeshareError::Parse(format!("CSV line is not UTF-8: {}", e)))
}

/// Station columns in name order, one row per `granularity`-th snapshot.
///
/// Lines go to `emit` as soon as they are formatted; snapshots are pulled
/// from the store one at a time. Returns the number of data rows.
pub fn stream_station_time_series<S, F>(store: &mut S, granularity: i64, mut emit: F) -> Result<usize>
where
    S: StationRepository + StatusRepository,
    F: FnMut(String) -> Result<()>,
{
    // Checked before the header goes out so a bad stride never yields a
    // header-only export
    ensure_positive("granularity", granularity)?;

    let format = TimeSeriesFormat::new(&store.list_stations(true)?);
    emit(format.header()?)?;

    let rows = store.for_each_downsampled_status(granularity, &mut |snapshot| emit(format.row(&snapshot)?))?;
    tracing::debug!(
        "Time series: {} stations x {} snapshots (every {})",
        format.station_names.len(),
        rows,
        granularity
    );
    Ok(rows)
}

/// Writes the export to `out` line by line. Returns the number of data rows.
pub fn write_time_series<S, W>(store: &mut S, granularity: i64, out: &mut W) -> Result<usize>
where
    S: StationRepository + StatusRepository,
    W: Write,
{
    let rows = stream_station_time_series(store, granularity, |line| {
        out.write_all(line.as_bytes())?;
        Ok(())
    })?;
    out.flush()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Station detail
// ---------------------------------------------------------------------------

/// One station with its readings over the downsampled series and in the
/// latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationDetail {
    pub station: Station,
    pub time_series: Vec<StationReading>,
    /// `None` when there is no snapshot yet or the latest one doesn't
    /// mention this station.
    pub latest: Option<StationReading>,
}

/// # Errors
/// `BikeshareError::NotFound` if `station_id` is unknown.
pub fn build_station_detail<S>(store: &mut S, station_id: i32, granularity: i64) -> Result<StationDetail>
where
    S: StationRepository + StatusRepository,
{
    let station = store
        .get_station(station_id)?
        .ok_or_else(|| BikeshareError::NotFound(format!("station {}", station_id)))?;

    let mut time_series = Vec::new();
    for snapshot in store.downsampled_statuses(granularity)? {
        if let Some(entry) = find_entry(&station, &snapshot)? {
            time_series.push(StationReading {
                timestamp: snapshot.timestamp,
                entry,
            });
        }
    }

    let latest = match store.latest_status()? {
        Some(snapshot) => find_entry(&station, &snapshot)?.map(|entry| StationReading {
            timestamp: snapshot.timestamp,
            entry,
        }),
        None => None,
    };

    Ok(StationDetail {
        station,
        time_series,
        latest,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{DateTime, Utc};
    use serde_json::{json, Value};

    fn station(id: i32, name: &str) -> Station {
        Station {
            id,
            name: name.to_string(),
            address: None,
            longitude: 127.0,
            latitude: 37.5,
            rack_count: 10,
            in_service: true,
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn payload(counts: &[(&str, &str)]) -> Value {
        let list: Vec<Value> = counts
            .iter()
            .map(|(name, bikes)| json!({ "stationName": name, "parkingBikeTotCnt": bikes }))
            .collect();
        json!({ "realtimeList": list })
    }

    fn snapshot(secs: i64, data: Value) -> StationStatus {
        StationStatus { id: 1, timestamp: ts(secs), data }
    }

    #[test]
    fn test_find_entry_absent_is_none() {
        let snap = snapshot(0, payload(&[("A", "1")]));
        assert!(find_entry(&station(2, "B"), &snap).unwrap().is_none());
        assert_eq!(
            find_entry(&station(1, "A"), &snap).unwrap().unwrap().parked_bikes.as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_find_entry_returns_first_match() {
        let snap = snapshot(0, payload(&[("A", "1"), ("A", "2")]));
        let entry = find_entry(&station(1, "A"), &snap).unwrap().unwrap();
        assert_eq!(entry.parked_bikes.as_deref(), Some("1"));
    }

    #[test]
    fn test_time_series_format() {
        let format = TimeSeriesFormat::new(&[station(2, "Alpha"), station(1, "Beta, East")]);

        assert_eq!(format.header().unwrap(), "timestamp,Alpha,\"Beta, East\"\n");
        assert_eq!(
            format
                .row(&snapshot(1_466_000_000, payload(&[("Beta, East", "4"), ("Alpha", "7")])))
                .unwrap(),
            "1466000000,7,4\n"
        );
        assert_eq!(
            format.row(&snapshot(1_466_000_600, payload(&[("Alpha", "6")]))).unwrap(),
            "1466000600,6,\n"
        );
    }

    #[test]
    fn test_time_series_format_quotes_embedded_quotes() {
        let format = TimeSeriesFormat::new(&[station(1, "The \"Hub\"")]);
        assert_eq!(format.header().unwrap(), "timestamp,\"The \"\"Hub\"\"\"\n");
    }

    #[test]
    fn test_time_series_surfaces_malformed_snapshot() {
        let mut store = MemoryStore::new();
        store.replace_all(&[station(1, "A")]).unwrap();
        store.append_status(&json!({}), ts(60)).unwrap();

        let mut lines = Vec::new();
        let result = stream_station_time_series(&mut store, 1, |line| {
            lines.push(line);
            Ok(())
        });

        assert!(matches!(result, Err(BikeshareError::Parse(_))));
        assert_eq!(lines, vec!["timestamp,A\n".to_string()], "header comes first");
    }

    #[test]
    fn test_time_series_rejects_zero_granularity_before_header() {
        let mut store = MemoryStore::new();
        let mut out = Vec::new();

        let err = write_time_series(&mut store, 0, &mut out).unwrap_err();

        assert!(matches!(err, BikeshareError::InvalidArgument(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_time_series_emits_lines_as_rows_arrive() {
        let mut store = MemoryStore::new();
        store.replace_all(&[station(1, "A")]).unwrap();
        for i in 1..=3i64 {
            let bikes = i.to_string();
            store.append_status(&payload(&[("A", bikes.as_str())]), ts(i * 60)).unwrap();
        }

        // The emitter fails on the second data row; the third is never formatted
        let mut emitted = 0;
        let result = stream_station_time_series(&mut store, 1, |_| {
            emitted += 1;
            if emitted > 2 {
                return Err(BikeshareError::Io(std::io::Error::other("client went away")));
            }
            Ok(())
        });

        assert!(matches!(result, Err(BikeshareError::Io(_))));
        assert_eq!(emitted, 3);
    }

    #[test]
    fn test_write_time_series_downsamples() {
        let mut store = MemoryStore::new();
        store.replace_all(&[station(1, "B"), station(2, "A")]).unwrap();
        for i in 1..=4i64 {
            let bikes = i.to_string();
            store.append_status(&payload(&[("A", bikes.as_str())]), ts(i * 60)).unwrap();
        }

        let mut out = Vec::new();
        let rows = write_time_series(&mut store, 2, &mut out).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "timestamp,A,B\n120,2,\n240,4,\n");
    }

    #[test]
    fn test_detail_without_latest_entry() {
        let mut store = MemoryStore::new();
        store.replace_all(&[station(1, "A"), station(2, "B")]).unwrap();
        store.append_status(&payload(&[("A", "3"), ("B", "5")]), ts(60)).unwrap();
        store.append_status(&payload(&[("A", "4")]), ts(120)).unwrap();

        let detail = build_station_detail(&mut store, 2, 1).unwrap();
        assert_eq!(detail.station.name, "B");
        assert!(detail.latest.is_none());
        assert_eq!(detail.time_series.len(), 1);
        assert_eq!(detail.time_series[0].timestamp, ts(60));

        let detail = build_station_detail(&mut store, 1, 1).unwrap();
        let latest = detail.latest.unwrap();
        assert_eq!(latest.timestamp, ts(120));
        assert_eq!(latest.entry.parked_bikes.as_deref(), Some("4"));
    }

    #[test]
    fn test_detail_unknown_station() {
        let mut store = MemoryStore::new();
        assert!(build_station_detail(&mut store, 99, 10).unwrap_err().is_not_found());
    }
}
