//! Local-business search through SerpApi's Google Maps engine.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::entities::Listing;
use crate::error::ProviderError;

pub const DEFAULT_SERPAPI_BASE_URL: &str = "https://serpapi.com";

/// SerpApi reports an exhausted result set as an error string.
const NO_RESULTS_MARKER: &str = "hasn't returned any results";

/// What to look for and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub category: String,
    pub city: String,
    pub country: String,
}

impl SearchQuery {
    pub fn new(category: &str, city: &str, country: &str) -> Self {
        SearchQuery {
            category: category.trim().to_string(),
            city: city.trim().to_string(),
            country: country.trim().to_string(),
        }
    }

    /// Free-text query sent to the provider.
    pub fn text(&self) -> String {
        [self.category.as_str(), self.city.as_str(), self.country.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One page of local-search results starting at `offset`.
#[async_trait]
pub trait LocalSearch: Send + Sync {
    async fn search_page(&self, query: &SearchQuery, offset: u32) -> Result<Vec<Listing>, ProviderError>;
}

#[derive(Deserialize, Debug)]
struct SerpApiResponse {
    #[serde(default)]
    local_results: Vec<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SerpApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl SerpApiClient {
    pub fn new(client: Client, base_url: &str, api_key: &str, language: &str) -> Self {
        SerpApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl LocalSearch for SerpApiClient {
    #[tracing::instrument(skip(self, query), fields(q = %query.text()))]
    async fn search_page(&self, query: &SearchQuery, offset: u32) -> Result<Vec<Listing>, ProviderError> {
        let url = format!("{}/search.json", self.base_url);
        let start = offset.to_string();
        let q = query.text();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("engine", "google_maps"),
                ("type", "search"),
                ("q", q.as_str()),
                ("hl", self.language.as_str()),
                ("start", start.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        let payload = response.json::<SerpApiResponse>().await?;

        if let Some(error) = payload.error {
            if error.contains(NO_RESULTS_MARKER) {
                debug!("SerpApi has no more results: {}", error);
                return Ok(Vec::new());
            }
            return Err(ProviderError::Provider(error));
        }

        // An unreadable entry stays in the page as a nameless listing, so the
        // page length still reflects what the provider sent.
        let listings = payload
            .local_results
            .into_iter()
            .map(|raw| {
                serde_json::from_value::<Listing>(raw).unwrap_or_else(|e| {
                    warn!("Unreadable local result: {}", e);
                    Listing::default()
                })
            })
            .collect::<Vec<_>>();

        debug!("SerpApi returned {} listings", listings.len());
        Ok(listings)
    }
}
