/// HTTP endpoint for station data
///
/// Provides a simple API over the repositories for dashboards and
/// analysis scripts.
///
/// Endpoints:
/// - GET /health                         - Service health check
/// - GET /stations/                      - All stations
/// - GET /stations/{id}/                 - Station detail with readings
/// - GET /stations/search?q={text}       - Stations whose name or address contains text
/// - GET|POST /stations/update/          - Run a full update cycle
/// - GET /stations/random/               - Redirect to a random station
/// - GET /stations/statuses/             - Most recent snapshots, newest first
/// - GET|POST /stations/statuses/import/ - Import snapshots from the status directory
/// - GET /machine-learning/csv/          - Downsampled bike counts as streamed CSV
///
/// Routing is independent of the HTTP server so every route can be
/// exercised against an in-memory store.

use crate::config::ServiceConfig;
use crate::error::{BikeshareError, Result};
use crate::import;
use crate::ingest::Upstream;
use crate::reconcile;
use crate::report;
use crate::store::{ensure_positive, StationRepository, StatusRepository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::thread;
use tiny_http::{Header, Response, StatusCode};

/// Formatted CSV lines buffered between the store and a slow client.
const CSV_STREAM_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Transport-independent response produced by routing.
pub enum ApiResponse {
    Json { status: u16, body: Value },
    Text { status: u16, body: String },
    Redirect { location: String },
    /// Time series export at a validated stride. Rows are read from the
    /// store and sent line by line while the response is written.
    Csv { granularity: i64 },
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        match self {
            ApiResponse::Json { status, .. } | ApiResponse::Text { status, .. } => *status,
            ApiResponse::Redirect { .. } => 302,
            ApiResponse::Csv { .. } => 200,
        }
    }
}

/// Snapshot listing entry; the payload itself is omitted.
#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub id: i32,
    pub timestamp: DateTime<Utc>,
    pub stations: Option<usize>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Request handler owning the repository handle and upstream client.
pub struct Api<S, U> {
    store: S,
    upstream: U,
    config: ServiceConfig,
}

impl<S, U> Api<S, U>
where
    S: StationRepository + StatusRepository,
    U: Upstream,
{
    pub fn new(store: S, upstream: U, config: ServiceConfig) -> Self {
        Self { store, upstream, config }
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Writes the CSV body for an `ApiResponse::Csv` to `out`.
    pub fn write_csv<W: Write>(&mut self, granularity: i64, out: &mut W) -> Result<usize> {
        report::write_time_series(&mut self.store, granularity, out)
    }

    /// Route one request.
    pub fn handle(&mut self, method: &str, url: &str) -> ApiResponse {
        let (path, query) = split_url(url);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let is_get = method == "GET";
        let is_get_or_post = is_get || method == "POST";

        let result = match segments.as_slice() {
            ["health"] if is_get => Ok(json_ok(json!({
                "status": "ok",
                "service": "bikeshare_service",
                "version": env!("CARGO_PKG_VERSION")
            }))),
            ["stations"] if is_get => self.list_stations(),
            ["stations", "search"] if is_get => self.search(&query),
            ["stations", "update"] if is_get_or_post => self.update(),
            ["stations", "random"] if is_get => self.random(),
            ["stations", "statuses"] if is_get => self.recent_statuses(),
            ["stations", "statuses", "import"] if is_get_or_post => self.import(),
            ["stations", id] if is_get => match id.parse::<i32>() {
                Ok(id) => self.detail(id),
                Err(_) => Err(BikeshareError::NotFound(format!("station {}", id))),
            },
            ["machine-learning", "csv"] if is_get => self.csv(&query),
            _ if !is_get_or_post => Ok(ApiResponse::Json {
                status: 405,
                body: json!({ "error": "Method not allowed" }),
            }),
            _ => Ok(ApiResponse::Json {
                status: 404,
                body: json!({
                    "error": "Not found",
                    "available_endpoints": [
                        "/health", "/stations/", "/stations/{id}/", "/stations/search?q=",
                        "/stations/update/", "/stations/random/", "/stations/statuses/",
                        "/stations/statuses/import/", "/machine-learning/csv/"
                    ]
                }),
            }),
        };

        result.unwrap_or_else(|e| error_response(&e))
    }

    fn list_stations(&mut self) -> Result<ApiResponse> {
        let stations = self.store.list_stations(false)?;
        to_json(&json!({ "stations": stations }))
    }

    fn search(&mut self, query: &HashMap<String, String>) -> Result<ApiResponse> {
        let text = query
            .get("q")
            .ok_or_else(|| BikeshareError::InvalidArgument("missing q parameter".to_string()))?;
        let stations = self.store.search_stations(text)?;
        to_json(&json!({ "query": text, "stations": stations }))
    }

    fn update(&mut self) -> Result<ApiResponse> {
        let summary = reconcile::run_full_update_cycle(
            &mut self.store,
            &self.upstream,
            self.config.max_address_pages,
        )?;
        tracing::info!(
            "Update via endpoint: snapshot {}, {} stations, {} addresses",
            summary.snapshot_id,
            summary.stations,
            summary.addresses
        );
        Ok(ApiResponse::Redirect { location: "/stations/".to_string() })
    }

    fn random(&mut self) -> Result<ApiResponse> {
        let station = self.store.random_station()?;
        Ok(ApiResponse::Redirect { location: format!("/stations/{}/", station.id) })
    }

    fn detail(&mut self, id: i32) -> Result<ApiResponse> {
        let detail = report::build_station_detail(&mut self.store, id, self.config.export_granularity)?;
        to_json(&detail)
    }

    fn recent_statuses(&mut self) -> Result<ApiResponse> {
        let statuses: Vec<StatusSummary> = self
            .store
            .recent_statuses(self.config.recent_status_limit)?
            .into_iter()
            .map(|s| StatusSummary {
                id: s.id,
                timestamp: s.timestamp,
                stations: s.data.get("realtimeList").and_then(Value::as_array).map(Vec::len),
            })
            .collect();
        to_json(&json!({ "statuses": statuses }))
    }

    fn import(&mut self) -> Result<ApiResponse> {
        let summary = import::import_directory(&mut self.store, &self.config.status_directory)?;
        Ok(ApiResponse::Text { status: 200, body: summary.total.to_string() })
    }

    fn csv(&mut self, query: &HashMap<String, String>) -> Result<ApiResponse> {
        let granularity = match query.get("granularity") {
            Some(raw) => raw.parse().map_err(|_| {
                BikeshareError::InvalidArgument(format!("granularity must be an integer: {}", raw))
            })?,
            None => self.config.export_granularity,
        };
        ensure_positive("granularity", granularity)?;
        Ok(ApiResponse::Csv { granularity })
    }
}

/// Splits a request URL into path and decoded query parameters.
fn split_url(url: &str) -> (&str, HashMap<String, String>) {
    let (path, raw_query) = url.split_once('?').unwrap_or((url, ""));

    let query = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect();

    (path, query)
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

fn json_ok(body: Value) -> ApiResponse {
    ApiResponse::Json { status: 200, body }
}

fn to_json<T: Serialize>(data: &T) -> Result<ApiResponse> {
    let body = serde_json::to_value(data)
        .map_err(|e| BikeshareError::Parse(format!("failed to serialize response: {}", e)))?;
    Ok(json_ok(body))
}

/// Maps the error taxonomy onto HTTP status codes. Lookup failures get a
/// generic body.
fn error_response(e: &BikeshareError) -> ApiResponse {
    let (status, body) = match e {
        BikeshareError::NotFound(_) => (404, json!({ "error": "Not found" })),
        BikeshareError::InvalidArgument(msg) => (400, json!({ "error": msg })),
        BikeshareError::Upstream(_) | BikeshareError::Parse(_) => (502, json!({ "error": e.to_string() })),
        _ => (500, json!({ "error": e.to_string() })),
    };
    if status >= 500 {
        tracing::error!("Request failed: {}", e);
    }
    ApiResponse::Json { status, body }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Adapts a line iterator to `Read` so tiny_http can send it chunked.
pub struct LinesReader<I> {
    lines: I,
    buffer: Vec<u8>,
    pos: usize,
}

impl<I> LinesReader<I> {
    pub fn new(lines: I) -> Self {
        Self { lines, buffer: Vec::new(), pos: 0 }
    }
}

impl<I> Read for LinesReader<I>
where
    I: Iterator<Item = Result<String>>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.buffer.len() {
            match self.lines.next() {
                None => return Ok(0),
                Some(Ok(line)) => {
                    self.buffer = line.into_bytes();
                    self.pos = 0;
                }
                Some(Err(e)) => return Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
            }
        }

        let n = buf.len().min(self.buffer.len() - self.pos);
        buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Start HTTP endpoint server on the specified port
pub fn start_endpoint_server<S, U>(port: u16, mut api: Api<S, U>) -> Result<()>
where
    S: StationRepository + StatusRepository,
    U: Upstream,
{
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| BikeshareError::Io(io::Error::other(format!("failed to start HTTP server: {}", e))))?;

    tracing::info!("HTTP endpoint listening on http://0.0.0.0:{}", port);

    for request in server.incoming_requests() {
        let method = request.method().as_str().to_string();
        let url = request.url().to_string();

        let response = api.handle(&method, &url);
        tracing::info!("{} {} -> {}", method, url, response.status());

        let sent = match response {
            ApiResponse::Csv { granularity } => stream_csv(request, &mut api.store, granularity),
            other => respond(request, other),
        };
        if let Err(e) = sent {
            tracing::warn!("Failed to send response: {}", e);
        }
    }

    Ok(())
}

fn respond(request: tiny_http::Request, response: ApiResponse) -> io::Result<()> {
    match response {
        ApiResponse::Json { status, body } => {
            let text = serde_json::to_string_pretty(&body).map_err(io::Error::other)?;
            request.respond(data_response(status, text.into_bytes(), "application/json"))
        }
        ApiResponse::Text { status, body } => {
            request.respond(data_response(status, body.into_bytes(), "text/plain; charset=utf-8"))
        }
        ApiResponse::Redirect { location } => request.respond(
            Response::empty(StatusCode(302)).with_header_opt(header("Location", &location)),
        ),
        ApiResponse::Csv { .. } => Err(io::Error::other("CSV responses are streamed from the store")),
    }
}

/// Sends the export as a chunked response. A scoped thread writes to the
/// client while this thread pulls rows from the store; the bounded channel
/// keeps at most `CSV_STREAM_DEPTH` lines in flight.
fn stream_csv<S>(request: tiny_http::Request, store: &mut S, granularity: i64) -> io::Result<()>
where
    S: StationRepository + StatusRepository,
{
    let (tx, rx) = mpsc::sync_channel::<Result<String>>(CSV_STREAM_DEPTH);
    let headers: Vec<Header> = header("Content-Type", "text/csv; charset=utf-8").into_iter().collect();

    thread::scope(|scope| {
        let writer = scope.spawn(move || {
            request.respond(Response::new(
                StatusCode(200),
                headers,
                LinesReader::new(rx.into_iter()),
                None,
                None,
            ))
        });

        let streamed = report::stream_station_time_series(store, granularity, |line| {
            tx.send(Ok(line))
                .map_err(|_| BikeshareError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")))
        });
        match streamed {
            Ok(rows) => tracing::debug!("Streamed {} CSV rows", rows),
            Err(e) => {
                tracing::error!("CSV export failed: {}", e);
                // Ends the chunked body early so the client sees a truncated transfer
                let _ = tx.send(Err(e));
            }
        }
        drop(tx);

        writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("CSV response thread panicked")))
    })
}

fn data_response(status: u16, bytes: Vec<u8>, content_type: &str) -> Response<io::Cursor<Vec<u8>>> {
    Response::from_data(bytes)
        .with_status_code(StatusCode(status))
        .with_header_opt(header("Content-Type", content_type))
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

trait WithHeaderOpt {
    fn with_header_opt(self, header: Option<Header>) -> Self;
}

impl<R: Read> WithHeaderOpt for Response<R> {
    fn with_header_opt(self, header: Option<Header>) -> Self {
        match header {
            Some(h) => self.with_header(h),
            None => self,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
