/// Station listing scraper.
///
/// The provider publishes station addresses only on a paginated HTML
/// listing. Each data row holds the station name inside a link in the
/// second cell and the street address inside a span in the sixth cell.
/// A page with no station rows marks the end of the listing.

use crate::error::{BikeshareError, Result};
use scraper::{ElementRef, Html, Selector};

/// Zero-based cell holding `<a>station name</a>`.
const NAME_COLUMN: usize = 1;
/// Zero-based cell holding `<span>address</span>`.
const ADDRESS_COLUMN: usize = 5;

/// One scraped row.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRow {
    pub name: String,
    pub address: String,
}

/// Fetch and parse one listing page.
///
/// # Errors
/// `BikeshareError::Upstream` on transport failure, a non-2xx status, or a
/// station row that no longer has the expected markup.
pub fn fetch_address_page(client: &reqwest::blocking::Client, url: &str) -> Result<Vec<AddressRow>> {
    tracing::debug!("Fetching station listing: {}", url);

    let response = client.get(url).send()?;

    if !response.status().is_success() {
        return Err(BikeshareError::Upstream(format!(
            "station listing error: {}",
            response.status()
        )));
    }

    let html = response.text()?;
    parse_address_page(&html)
}

/// Extracts (name, address) pairs from a listing page.
///
/// Rows with too few cells (headers, "no results" placeholders) are not
/// station rows and are skipped; an empty result means the page is past
/// the end of the listing.
pub fn parse_address_page(html: &str) -> Result<Vec<AddressRow>> {
    let document = Html::parse_document(html);
    let row_selector = selector("table tr")?;
    let cell_selector = selector("td")?;
    let link_selector = selector("a")?;
    let span_selector = selector("span")?;

    let mut rows = Vec::new();

    for (index, row) in document.select(&row_selector).enumerate() {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.len() <= ADDRESS_COLUMN {
            continue;
        }

        let name = cells[NAME_COLUMN]
            .select(&link_selector)
            .next()
            .map(collapsed_text)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                BikeshareError::Upstream(format!("listing row {} has no station link", index))
            })?;

        let address = cells[ADDRESS_COLUMN]
            .select(&span_selector)
            .next()
            .map(collapsed_text)
            .ok_or_else(|| {
                BikeshareError::Upstream(format!("listing row {} ({}) has no address span", index, name))
            })?;

        rows.push(AddressRow { name, address });
    }

    Ok(rows)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| BikeshareError::Parse(format!("invalid selector {}: {}", css, e)))
}

/// Element text with runs of whitespace collapsed to single spaces.
fn collapsed_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================
