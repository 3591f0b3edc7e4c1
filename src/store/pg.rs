/// PostgreSQL repository backend.
///
/// Tables are created by `sql/001_initial_schema.sql`. Multi-row writes
/// (`replace_all`, `append_batch`) each run inside a single transaction.

use super::{ensure_positive, StationRepository, StatusRepository};
use crate::error::{BikeshareError, Result};
use crate::model::{Station, StationStatus};
use chrono::{DateTime, Utc};
use postgres::fallible_iterator::FallibleIterator;
use postgres::{Client, Row};
use serde_json::Value;

const STATION_COLUMNS: &str = "id, name, address, longitude, latitude, rack_count, in_service";

/// Rows numbered from 1 in (timestamp, id) order; keeps every $1-th.
const DOWNSAMPLED_STATUSES: &str = "SELECT id, timestamp, data FROM (
         SELECT id, timestamp, data,
                row_number() OVER (ORDER BY timestamp ASC, id ASC) AS ordinal
         FROM station_statuses
     ) numbered
     WHERE ordinal % $1 = 0
     ORDER BY ordinal";

/// Repository handle owning one database connection.
pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }
}

fn station_from_row(row: &Row) -> Station {
    Station {
        id: row.get(0),
        name: row.get(1),
        address: row.get(2),
        longitude: row.get(3),
        latitude: row.get(4),
        rack_count: row.get(5),
        in_service: row.get(6),
    }
}

fn status_from_row(row: &Row) -> StationStatus {
    StationStatus {
        id: row.get(0),
        timestamp: row.get(1),
        data: row.get(2),
    }
}

impl StationRepository for PgStore {
    fn list_stations(&mut self, order_by_name: bool) -> Result<Vec<Station>> {
        let order = if order_by_name { "name, id" } else { "id" };
        let rows = self.client.query(
            &format!("SELECT {} FROM stations ORDER BY {}", STATION_COLUMNS, order),
            &[],
        )?;
        Ok(rows.iter().map(station_from_row).collect())
    }

    fn get_station(&mut self, id: i32) -> Result<Option<Station>> {
        let row = self.client.query_opt(
            &format!("SELECT {} FROM stations WHERE id = $1", STATION_COLUMNS),
            &[&id],
        )?;
        Ok(row.as_ref().map(station_from_row))
    }

    fn search_stations(&mut self, query: &str) -> Result<Vec<Station>> {
        // strpos avoids having to escape LIKE wildcards in user input
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM stations
                 WHERE strpos(lower(name), lower($1)) > 0
                    OR strpos(lower(coalesce(address, '')), lower($1)) > 0
                 ORDER BY name, id",
                STATION_COLUMNS
            ),
            &[&query],
        )?;
        Ok(rows.iter().map(station_from_row).collect())
    }

    fn replace_all(&mut self, stations: &[Station]) -> Result<()> {
        let mut tx = self.client.transaction()?;

        for station in stations {
            tx.execute("DELETE FROM stations WHERE id = $1", &[&station.id])?;
            tx.execute(
                &format!(
                    "INSERT INTO stations ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    STATION_COLUMNS
                ),
                &[
                    &station.id,
                    &station.name,
                    &station.address,
                    &station.longitude,
                    &station.latitude,
                    &station.rack_count,
                    &station.in_service,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn random_station(&mut self) -> Result<Station> {
        let row = self.client.query_opt(
            &format!("SELECT {} FROM stations ORDER BY random() LIMIT 1", STATION_COLUMNS),
            &[],
        )?;
        row.as_ref()
            .map(station_from_row)
            .ok_or_else(|| BikeshareError::NotFound("no stations recorded yet".to_string()))
    }

    fn find_by_name(&mut self, name: &str) -> Result<Option<Station>> {
        let row = self.client.query_opt(
            &format!(
                "SELECT {} FROM stations WHERE name = $1 ORDER BY id LIMIT 1",
                STATION_COLUMNS
            ),
            &[&name],
        )?;
        Ok(row.as_ref().map(station_from_row))
    }

    fn update_address(&mut self, id: i32, address: &str) -> Result<()> {
        let updated = self.client.execute(
            "UPDATE stations SET address = $2 WHERE id = $1",
            &[&id, &address],
        )?;
        if updated == 0 {
            return Err(BikeshareError::NotFound(format!("station {}", id)));
        }
        Ok(())
    }
}

impl StatusRepository for PgStore {
    fn append_status(&mut self, data: &Value, timestamp: DateTime<Utc>) -> Result<StationStatus> {
        let row = self.client.query_one(
            "INSERT INTO station_statuses (data, timestamp) VALUES ($1, $2)
             RETURNING id, timestamp, data",
            &[data, &timestamp],
        )?;
        Ok(status_from_row(&row))
    }

    fn append_batch(&mut self, snapshots: &[(Value, DateTime<Utc>)]) -> Result<usize> {
        let mut tx = self.client.transaction()?;

        for (data, timestamp) in snapshots {
            tx.execute(
                "INSERT INTO station_statuses (data, timestamp) VALUES ($1, $2)",
                &[data, timestamp],
            )?;
        }

        tx.commit()?;
        Ok(snapshots.len())
    }

    fn status_exists(&mut self, timestamp: DateTime<Utc>) -> Result<bool> {
        let row = self.client.query_one(
            "SELECT EXISTS(SELECT 1 FROM station_statuses WHERE timestamp = $1)",
            &[&timestamp],
        )?;
        Ok(row.get(0))
    }

    fn latest_status(&mut self) -> Result<Option<StationStatus>> {
        let row = self.client.query_opt(
            "SELECT id, timestamp, data FROM station_statuses
             ORDER BY timestamp DESC, id DESC LIMIT 1",
            &[],
        )?;
        Ok(row.as_ref().map(status_from_row))
    }

    fn recent_statuses(&mut self, limit: i64) -> Result<Vec<StationStatus>> {
        ensure_positive("limit", limit)?;
        let rows = self.client.query(
            "SELECT id, timestamp, data FROM station_statuses
             ORDER BY timestamp DESC, id DESC LIMIT $1",
            &[&limit],
        )?;
        Ok(rows.iter().map(status_from_row).collect())
    }

    fn downsampled_statuses(&mut self, granularity: i64) -> Result<Vec<StationStatus>> {
        ensure_positive("granularity", granularity)?;
        let rows = self.client.query(DOWNSAMPLED_STATUSES, &[&granularity])?;
        Ok(rows.iter().map(status_from_row).collect())
    }

    fn for_each_downsampled_status(
        &mut self,
        granularity: i64,
        visit: &mut dyn FnMut(StationStatus) -> Result<()>,
    ) -> Result<usize> {
        ensure_positive("granularity", granularity)?;
        let mut rows = self.client.query_raw(DOWNSAMPLED_STATUSES, &[granularity])?;

        let mut count = 0usize;
        while let Some(row) = rows.next()? {
            visit(status_from_row(&row))?;
            count += 1;
        }
        Ok(count)
    }

    fn status_count(&mut self) -> Result<i64> {
        let row = self.client.query_one("SELECT count(*) FROM station_statuses", &[])?;
        Ok(row.get(0))
    }
}
