/// Bike-share realtime status API client.
///
/// A single GET returns the current bike and dock counts for every
/// station in the network. The body is kept as a JSON value so it can be
/// stored verbatim as a snapshot; typed projection happens in
/// `model::StatusEntry`.

use crate::error::{BikeshareError, Result};
use serde_json::Value;

/// Fetch the realtime status payload.
///
/// # Errors
/// `BikeshareError::Upstream` on transport failure, a non-2xx status, or a
/// body that is not JSON. No retry is attempted.
pub fn fetch_realtime_status(client: &reqwest::blocking::Client, url: &str) -> Result<Value> {
    tracing::debug!("Fetching realtime status: {}", url);

    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()?;

    if !response.status().is_success() {
        return Err(BikeshareError::Upstream(format!(
            "realtime status API error: {}",
            response.status()
        )));
    }

    let body = response.text()?;
    parse_realtime_body(&body)
}

/// Parses a realtime response body into a JSON value.
pub fn parse_realtime_body(body: &str) -> Result<Value> {
    serde_json::from_str(body)
        .map_err(|e| BikeshareError::Upstream(format!("realtime status body is not JSON: {}", e)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use crate::model::parse_payload;

    #[test]
    fn test_parse_realtime_body() {
        let value = parse_realtime_body(fixture_realtime_status_json()).unwrap();
        let payload = parse_payload(&value).unwrap();

        assert_eq!(payload.realtime_list.len(), 2);
        assert_eq!(payload.realtime_list[0].station_name, "101. Mangwon Station Exit 1");
        assert_eq!(payload.realtime_list[1].use_flag.as_deref(), Some("N"));
    }

    #[test]
    fn test_body_kept_verbatim() {
        let value = parse_realtime_body(fixture_realtime_status_json()).unwrap();
        assert_eq!(value["realtimeList"][0]["shared"], "41");
    }

    #[test]
    fn test_html_error_page_is_upstream_error() {
        let result = parse_realtime_body("<html><body>Service Unavailable</body></html>");
        assert!(matches!(result, Err(BikeshareError::Upstream(_))));
    }
}
