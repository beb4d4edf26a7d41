//! The request-wide search loop: categories in order, pages in order, one
//! pitch batch per page of qualifying businesses.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::classify_website;
use crate::dedup::{DedupKey, SeenSet};
use crate::entities::{Candidate, Lead, Listing, WebPresence};
use crate::outreach::PitchGenerator;
use crate::policy::Policy;
use crate::search::{LocalSearch, SearchQuery};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_MAX_OFFSET: u32 = 100;
pub const MAX_CATEGORIES: usize = 3;
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 50;
pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_COUNTRY: &str = "Italia";

/// Page size and offset cap for the search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: u32,
    pub max_offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page_size: DEFAULT_PAGE_SIZE,
            max_offset: DEFAULT_MAX_OFFSET,
        }
    }
}

/// A validated lead search.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRequest {
    pub city: String,
    pub country: String,
    pub categories: Vec<String>,
    pub limit: usize,
    pub include_with_website: bool,
    pub use_ai: bool,
}

/// Normalize user-supplied categories: split on commas, trim, drop blanks and
/// case-insensitive repeats, keep at most [`MAX_CATEGORIES`]. Falls back to
/// `default_category` when nothing is left.
pub fn normalize_categories<S: AsRef<str>>(raw: &[S], default_category: &str) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for value in raw {
        for part in value.as_ref().split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let folded = part.to_lowercase();
            if categories.iter().any(|c| c.to_lowercase() == folded) {
                continue;
            }
            categories.push(part.to_string());
        }
    }
    categories.truncate(MAX_CATEGORIES);
    if categories.is_empty() {
        categories.push(default_category.to_string());
    }
    categories
}

/// Trimmed `raw` country, or [`DEFAULT_COUNTRY`] when missing or blank.
pub fn country_or_default(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COUNTRY)
        .to_string()
}

pub struct LeadFinder {
    search: Arc<dyn LocalSearch>,
    pitcher: Arc<PitchGenerator>,
    policy: Arc<Policy>,
    pagination: Pagination,
}

impl LeadFinder {
    pub fn new(
        search: Arc<dyn LocalSearch>,
        pitcher: Arc<PitchGenerator>,
        policy: Arc<Policy>,
        pagination: Pagination,
    ) -> Self {
        LeadFinder {
            search,
            pitcher,
            policy,
            pagination,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Collect up to `request.limit` unique leads.
    #[tracing::instrument(skip(self, request), fields(city = %request.city, limit = request.limit))]
    pub async fn find_leads(&self, request: &LeadRequest) -> Vec<Lead> {
        let mut leads: Vec<Lead> = Vec::with_capacity(request.limit);
        let mut seen = SeenSet::new();

        for category in &request.categories {
            if leads.len() >= request.limit {
                break;
            }
            self.collect_category(request, category, &mut seen, &mut leads).await;
        }

        info!(
            "Found {} leads for {} in {} ({} businesses seen)",
            leads.len(),
            request.categories.join(", "),
            request.city,
            seen.len()
        );
        leads
    }

    async fn collect_category(
        &self,
        request: &LeadRequest,
        category: &str,
        seen: &mut SeenSet,
        leads: &mut Vec<Lead>,
    ) {
        let query = SearchQuery::new(category, &request.city, &request.country);
        let page_size = self.pagination.page_size.max(1);
        let mut offset: u32 = 0;

        loop {
            if leads.len() >= request.limit {
                return;
            }

            let page = match self.search.search_page(&query, offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Search failed for '{}' at offset {}: {}", query.text(), offset, e);
                    Vec::new()
                }
            };
            let page_len = page.len();
            debug!("Page at offset {} for '{}' has {} results", offset, category, page_len);

            let quota = request.limit - leads.len();
            let candidates = self.qualify(page, request.include_with_website, quota, seen);

            if !candidates.is_empty() {
                let pitches = self
                    .pitcher
                    .pitch_batch(&candidates, category, &request.city, request.use_ai)
                    .await;
                leads.extend(
                    candidates
                        .into_iter()
                        .zip(pitches)
                        .map(|(candidate, pitch)| candidate.into_lead(pitch)),
                );
            }

            let next_offset = offset.saturating_add(page_size);
            if page_len < page_size as usize || next_offset > self.pagination.max_offset {
                debug!("Done with '{}' after offset {}", category, offset);
                return;
            }
            offset = next_offset;
        }
    }

    /// Turn one page into at most `quota` new candidates, marking each seen.
    fn qualify(
        &self,
        page: Vec<Listing>,
        include_with_website: bool,
        quota: usize,
        seen: &mut SeenSet,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for listing in page {
            if candidates.len() >= quota {
                break;
            }
            let Some(name) = listing.name() else {
                continue;
            };

            let key = DedupKey::new(name, listing.address.as_deref(), listing.phone.as_deref());
            if seen.contains(&key) {
                debug!("Skipping duplicate business {}", name);
                continue;
            }

            let status = classify_website(listing.website(), &self.policy.directory_domains);
            if status == WebPresence::HasWebsite && !include_with_website {
                debug!("Skipping {}: has its own website", name);
                continue;
            }

            seen.insert(key);
            candidates.push(Candidate {
                name: name.to_string(),
                address: trimmed(listing.address.as_deref()),
                phone: trimmed(listing.phone.as_deref()),
                rating: listing.rating,
                reviews: listing.reviews,
                status,
                url: listing.website().map(str::to_string),
            });
        }

        candidates
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
