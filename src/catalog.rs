use reqwest::blocking::Client;
use scraper::{Html, Selector};

use crate::domain::{SubsetCode, ZincId};
use crate::error::HarvestError;
use crate::http::{self, HttpSettings};

/// Structural marker of the id caption on a catalog listing page.
pub const ZINC_ID_SELECTOR: &str = ".zinc-id.caption";

pub trait CatalogClient: Send + Sync {
    /// Returns the raw HTML of one listing page of `subset`.
    fn fetch_listing(&self, subset: SubsetCode, page: u32) -> Result<String, HarvestError>;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    base_url: String,
    max_retries: usize,
}

impl CatalogHttpClient {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, HarvestError> {
        Ok(Self {
            client: http::build_client(settings)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
        })
    }

    pub fn listing_url(base_url: &str, subset: SubsetCode, page: u32) -> String {
        format!("{}/{subset}/?page={page}", base_url.trim_end_matches('/'))
    }
}

impl CatalogClient for CatalogHttpClient {
    fn fetch_listing(&self, subset: SubsetCode, page: u32) -> Result<String, HarvestError> {
        let url = Self::listing_url(&self.base_url, subset, page);
        tracing::debug!(%url, "fetching listing page");
        let response = http::send_with_retries(self.max_retries, || self.client.get(&url))
            .map_err(|err| HarvestError::CatalogHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "catalog request failed".to_string());
            return Err(HarvestError::CatalogStatus { status, message });
        }
        response
            .text()
            .map_err(|err| HarvestError::CatalogHttp(err.to_string()))
    }
}

/// Extracts canonical ids from every caption element of a listing page.
/// Captions whose text is not a ZINC id are dropped.
pub fn extract_zinc_ids(html: &str) -> Result<Vec<ZincId>, HarvestError> {
    let selector =
        Selector::parse(ZINC_ID_SELECTOR).map_err(|err| HarvestError::HtmlParse(err.to_string()))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .filter_map(|element| ZincId::normalize(&element.text().collect::<String>()))
        .collect())
}
