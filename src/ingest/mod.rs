/// Upstream bike-share provider clients.
///
/// - `realtime` — realtime status JSON endpoint
/// - `address`  — paginated station listing HTML (addresses)
/// - `fixtures` (test only) — representative provider payloads

pub mod address;
pub mod realtime;

#[cfg(test)]
pub(crate) mod fixtures;

pub use address::AddressRow;

use crate::config::ServiceConfig;
use crate::error::Result;
use serde_json::Value;
use std::time::Duration;

/// Source of realtime status payloads and station listing pages.
pub trait Upstream {
    fn fetch_realtime_status(&self) -> Result<Value>;

    /// Rows of one 1-based listing page; empty once past the last page.
    fn fetch_address_page(&self, page: u32) -> Result<Vec<AddressRow>>;
}

/// Blocking HTTP client for the provider.
pub struct HttpUpstream {
    client: reqwest::blocking::Client,
    config: ServiceConfig,
}

impl HttpUpstream {
    /// Builds a client whose requests all time out after
    /// `config.http_timeout_secs`.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("bikeshare_service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

impl Upstream for HttpUpstream {
    fn fetch_realtime_status(&self) -> Result<Value> {
        realtime::fetch_realtime_status(&self.client, &self.config.realtime_url)
    }

    fn fetch_address_page(&self, page: u32) -> Result<Vec<AddressRow>> {
        address::fetch_address_page(&self.client, &self.config.address_page_url(page))
    }
}
