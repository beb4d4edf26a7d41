//! Policy data: the directory denylist, prompt and fallback templates, and
//! model preferences. Compiled-in defaults can be overridden per field from a
//! JSON file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AppError;

/// Listing and social platforms that do not count as an owned website.
/// Matched as substrings of the normalized host.
const DIRECTORY_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "tiktok.com",
    "twitter.com",
    "linkedin.com",
    "youtube.com",
    "linktr.ee",
    "whatsapp.com",
    "tripadvisor.",
    "thefork.",
    "yelp.",
    "just-eat.",
    "justeat.",
    "deliveroo.",
    "glovoapp.com",
    "ubereats.com",
    "booking.com",
    "paginegialle.it",
    "paginebianche.it",
    "virgilio.it",
    "misterimprese.it",
    "prontopro.it",
    "treatwell.",
    "business.site",
    "google.com",
];

const PREFERRED_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-flash-latest",
    "gemini-pro",
];

const BATCH_PROMPT: &str = "You are an expert copywriter selling professional websites to small local businesses.\n\
Below are {count} businesses of category \"{category}\" in {city}. For each one write a short, \
persuasive outreach message (at most 80 words) in Italian, using the formal \"Lei\". \
If the business has no website, stress the customers it loses to competitors that can be found online. \
If it only has a directory or social page, explain why an owned website builds more trust. \
Close with an offer of a free, no-obligation consultation.\n\n\
Businesses:\n{businesses}\n\n\
Reply ONLY with a JSON array, one object per business, in the form \
[{\"index\": 0, \"pitch\": \"...\"}]. Use the index shown next to each business.";

const FALLBACK_NO_WEBSITE: &str = "Buongiorno {name}, cercando {category} a {city} ho notato che la vostra attività \
non ha ancora un sito web. Oggi la maggior parte dei clienti sceglie online: un sito moderno e veloce vi renderebbe \
più visibili e credibili rispetto alla concorrenza. Le andrebbe una breve consulenza gratuita e senza impegno?";

const FALLBACK_DIRECTORY_ONLY: &str = "Buongiorno {name}, cercando {category} a {city} ho visto che la vostra presenza \
online si appoggia solo su {site}. Un sito web di proprietà vi darebbe più fiducia da parte dei clienti e pieno \
controllo su orari, menu e prenotazioni. Le andrebbe una breve consulenza gratuita e senza impegno?";

const FALLBACK_HAS_WEBSITE: &str = "Buongiorno {name}, cercando {category} a {city} ho visitato {site}. Con qualche \
intervento su velocità, versione mobile e chiamate all'azione il sito potrebbe portarvi molti più contatti. \
Le andrebbe una breve analisi gratuita e senza impegno?";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Host substrings that mark a website as a third-party listing.
    pub directory_domains: Vec<String>,
    /// Category searched when the request names none.
    pub default_category: String,
    /// Batch prompt; placeholders `{category}`, `{city}`, `{count}`, `{businesses}`.
    pub batch_prompt: String,
    pub fallback: FallbackTemplates,
    /// Model identifiers tried in order when no configured model is listed.
    pub preferred_models: Vec<String>,
    /// Substring used to pick a model when none of the preferred ones exist.
    pub model_name_hint: String,
}

/// Deterministic pitch templates; placeholders `{name}`, `{city}`, `{category}`, `{site}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTemplates {
    pub no_website: String,
    pub directory_only: String,
    pub has_website: String,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            directory_domains: DIRECTORY_DOMAINS.iter().map(|d| d.to_string()).collect(),
            default_category: "ristorante".to_string(),
            batch_prompt: BATCH_PROMPT.to_string(),
            fallback: FallbackTemplates::default(),
            preferred_models: PREFERRED_MODELS.iter().map(|m| m.to_string()).collect(),
            model_name_hint: "flash".to_string(),
        }
    }
}

impl Default for FallbackTemplates {
    fn default() -> Self {
        FallbackTemplates {
            no_website: FALLBACK_NO_WEBSITE.to_string(),
            directory_only: FALLBACK_DIRECTORY_ONLY.to_string(),
            has_website: FALLBACK_HAS_WEBSITE.to_string(),
        }
    }
}

impl Policy {
    /// Parse a policy document; fields it omits keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let mut policy: Policy = serde_json::from_str(raw)?;
        policy.directory_domains = policy
            .directory_domains
            .into_iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Ok(policy)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("cannot read policy file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }
}
