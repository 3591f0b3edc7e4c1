/// Service configuration loader - parses bikeshare.toml
///
/// Keeps upstream URLs, timeouts and schedule knobs out of the code so
/// they can be adjusted without recompiling. Every field has a default,
/// so a missing file is not an error.

use crate::error::{BikeshareError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "bikeshare.toml";

pub const BIKESEOUL_REALTIME_STATUS_URL: &str =
    "https://www.bikeseoul.com/app/station/getStationRealtimeStatus.do";

pub const BIKESEOUL_STATION_LIST_URL: &str =
    "https://www.bikeseoul.com/app/station/moveStationSearchView.do?currentPageNo={page}";

/// Runtime configuration for every trigger (CLI, daemon, endpoint).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Realtime status JSON endpoint.
    pub realtime_url: String,
    /// Station listing page; `{page}` is replaced by the 1-based page number.
    pub address_url: String,
    /// Applied to every outbound request, including each listing page.
    pub http_timeout_secs: u64,
    /// Hard stop for the address scrape in case the listing never ends.
    pub max_address_pages: u32,
    /// Directory of epoch-named snapshot files for the batch importer.
    pub status_directory: PathBuf,
    pub poll_interval_minutes: u64,
    /// Keep every Nth snapshot in exports and station detail.
    pub export_granularity: i64,
    /// One day of minute-granularity snapshots.
    pub recent_status_limit: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            realtime_url: BIKESEOUL_REALTIME_STATUS_URL.to_string(),
            address_url: BIKESEOUL_STATION_LIST_URL.to_string(),
            http_timeout_secs: 30,
            max_address_pages: 200,
            status_directory: PathBuf::from("station_statuses"),
            poll_interval_minutes: 1,
            export_granularity: 10,
            recent_status_limit: 60 * 24,
        }
    }
}

impl ServiceConfig {
    /// Builds the listing URL for one page.
    pub fn address_page_url(&self, page: u32) -> String {
        self.address_url.replace("{page}", &page.to_string())
    }

    fn validate(self) -> Result<Self> {
        if self.export_granularity < 1 {
            return Err(BikeshareError::Config(format!(
                "export_granularity must be at least 1, got {}",
                self.export_granularity
            )));
        }
        if self.recent_status_limit < 1 {
            return Err(BikeshareError::Config(format!(
                "recent_status_limit must be at least 1, got {}",
                self.recent_status_limit
            )));
        }
        if self.max_address_pages == 0 {
            return Err(BikeshareError::Config("max_address_pages must be at least 1".to_string()));
        }
        if !self.address_url.contains("{page}") {
            return Err(BikeshareError::Config(format!(
                "address_url must contain a {{page}} placeholder: {}",
                self.address_url
            )));
        }
        Ok(self)
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<ServiceConfig> {
    let config: ServiceConfig = toml::from_str(contents)
        .map_err(|e| BikeshareError::Config(format!("failed to parse configuration: {}", e)))?;
    config.validate()
}

/// Loads configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<ServiceConfig> {
    if !path.exists() {
        tracing::debug!("No configuration at {}, using defaults", path.display());
        return ServiceConfig::default().validate();
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| BikeshareError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    parse_config(&contents)
}
