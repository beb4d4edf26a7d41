//! Outreach message generation: one model call per batch of candidates, with a
//! deterministic template substituted for anything the model does not deliver.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::classify::extract_domain;
use crate::entities::{Candidate, WebPresence};
use crate::error::ProviderError;
use crate::gemini::{bare_model_name, TextModel};
use crate::policy::{FallbackTemplates, Policy};

/// First `[` to last `]`, across newlines.
static ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("array pattern is valid"));

const RATE_LIMIT_SIGNATURES: &[&str] = &[
    "429",
    "resource_exhausted",
    "rate limit",
    "quota",
    "too many requests",
];

/// True when an error message looks like provider throttling.
pub fn is_rate_limited(error_text: &str) -> bool {
    let lowered = error_text.to_lowercase();
    RATE_LIMIT_SIGNATURES.iter().any(|s| lowered.contains(s))
}

/// Pick a model from `available`: the configured one if listed, then the first
/// listed preference, then any name containing `hint`, then the first listed.
pub fn choose_model(
    available: &[String],
    configured: Option<&str>,
    preferred: &[String],
    hint: &str,
) -> Option<String> {
    let listed = |wanted: &str| {
        let wanted = bare_model_name(wanted);
        available.iter().find(|m| bare_model_name(m) == wanted).cloned()
    };

    if let Some(found) = configured.filter(|c| !c.trim().is_empty()).and_then(listed) {
        return Some(found);
    }
    if let Some(found) = preferred.iter().find_map(|p| listed(p.as_str())) {
        return Some(found);
    }
    if !hint.is_empty() {
        if let Some(found) = available.iter().find(|m| m.contains(hint)) {
            return Some(found.clone());
        }
    }
    available.first().cloned()
}

/// Lazily negotiated model name, shared by every request of one generator.
///
/// The lock is held while the model list is fetched, so requests racing the
/// first lookup wait for it instead of issuing their own. A failed lookup
/// leaves the slot empty and the next call tries again.
#[derive(Debug, Default)]
pub struct ModelSelector {
    configured: Option<String>,
    preferred: Vec<String>,
    hint: String,
    selected: Mutex<Option<String>>,
}

impl ModelSelector {
    pub fn new(configured: Option<String>, preferred: Vec<String>, hint: String) -> Self {
        ModelSelector {
            configured,
            preferred,
            hint,
            selected: Mutex::new(None),
        }
    }

    /// The selected model, or `None` after logging why there is none.
    pub async fn resolve(&self, backend: &dyn TextModel) -> Option<String> {
        match self.try_resolve(backend).await {
            Ok(model) => Some(model),
            Err(e) => {
                warn!("No language model for outreach messages: {}", e);
                None
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but reports why selection failed.
    pub async fn try_resolve(&self, backend: &dyn TextModel) -> Result<String, ProviderError> {
        let mut slot = self.selected.lock().await;
        if let Some(model) = slot.as_ref() {
            return Ok(model.clone());
        }

        let available = backend.list_models().await?;
        let model = choose_model(&available, self.configured.as_deref(), &self.preferred, &self.hint)
            .ok_or_else(|| ProviderError::Unavailable("no generation model listed".to_string()))?;

        info!("Selected language model {}", model);
        *slot = Some(model.clone());
        Ok(model)
    }

    /// The model picked so far, if any.
    pub async fn current(&self) -> Option<String> {
        self.selected.lock().await.clone()
    }
}

/// Render the deterministic pitch for one business.
pub fn fallback_pitch(
    templates: &FallbackTemplates,
    name: &str,
    city: &str,
    category: &str,
    status: WebPresence,
    url: Option<&str>,
) -> String {
    let template = match status {
        WebPresence::NoWebsite => &templates.no_website,
        WebPresence::DirectoryOnly => &templates.directory_only,
        WebPresence::HasWebsite => &templates.has_website,
    };
    let site = url
        .map(|u| extract_domain(u).unwrap_or_else(|| u.trim().to_string()))
        .unwrap_or_default();

    template
        .replace("{name}", name.trim())
        .replace("{city}", city.trim())
        .replace("{category}", category.trim())
        .replace("{site}", &site)
}

/// Fill the batch prompt template with one numbered line per candidate.
pub fn build_batch_prompt(template: &str, candidates: &[Candidate], category: &str, city: &str) -> String {
    let businesses = candidates
        .iter()
        .enumerate()
        .map(|(index, c)| {
            let mut line = format!("{}. {} | status: {}", index, c.name, c.status);
            if let Some(address) = &c.address {
                line.push_str(&format!(" | address: {}", address));
            }
            if let Some(rating) = c.rating {
                line.push_str(&format!(" | rating: {:.1}", rating));
                if let Some(reviews) = c.reviews {
                    line.push_str(&format!(" ({} reviews)", reviews));
                }
            }
            if let Some(url) = &c.url {
                line.push_str(&format!(" | site: {}", url));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    template
        .replace("{category}", category.trim())
        .replace("{city}", city.trim())
        .replace("{count}", &candidates.len().to_string())
        .replace("{businesses}", &businesses)
}

#[derive(Deserialize, Debug)]
struct BatchItem {
    #[serde(alias = "id")]
    index: Value,
    #[serde(default, alias = "message")]
    pitch: Option<String>,
}

fn item_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn reply_items(reply: &str) -> Option<Vec<Value>> {
    let trimmed = reply.trim();
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
        return Some(items);
    }

    let matched = ARRAY_RE.find(trimmed)?;
    match serde_json::from_str::<Value>(matched.as_str()) {
        Ok(Value::Array(items)) => Some(items),
        Ok(_) => None,
        Err(e) => {
            debug!("Extracted array is not valid JSON: {}", e);
            None
        }
    }
}

/// Map a model reply onto `count` slots. Slots whose item is missing,
/// unparsable, empty or out of range stay `None`; the first item for an
/// index wins.
pub fn parse_batch_reply(reply: &str, count: usize) -> Vec<Option<String>> {
    let mut pitches = vec![None; count];

    let Some(items) = reply_items(reply) else {
        warn!("Model reply holds no JSON array; len={}", reply.len());
        return pitches;
    };

    for raw in items {
        let item = match serde_json::from_value::<BatchItem>(raw) {
            Ok(item) => item,
            Err(e) => {
                debug!("Skipping malformed batch item: {}", e);
                continue;
            }
        };
        let Some(index) = item_index(&item.index).filter(|i| *i < count) else {
            debug!("Skipping batch item with index {:?}", item.index);
            continue;
        };
        let Some(pitch) = item.pitch.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) else {
            continue;
        };
        if pitches[index].is_none() {
            pitches[index] = Some(pitch);
        }
    }

    pitches
}

/// Writes one pitch per candidate, through the language model when one is
/// configured and reachable, from the fallback templates otherwise.
pub struct PitchGenerator {
    backend: Option<Arc<dyn TextModel>>,
    selector: ModelSelector,
    policy: Arc<Policy>,
}

impl PitchGenerator {
    pub fn new(backend: Option<Arc<dyn TextModel>>, configured_model: Option<String>, policy: Arc<Policy>) -> Self {
        let selector = ModelSelector::new(
            configured_model,
            policy.preferred_models.clone(),
            policy.model_name_hint.clone(),
        );
        PitchGenerator {
            backend,
            selector,
            policy,
        }
    }

    /// Generator that only ever uses the fallback templates.
    pub fn templates_only(policy: Arc<Policy>) -> Self {
        Self::new(None, None, policy)
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn fallback_for(&self, candidate: &Candidate, category: &str, city: &str) -> String {
        fallback_pitch(
            &self.policy.fallback,
            &candidate.name,
            city,
            category,
            candidate.status,
            candidate.url.as_deref(),
        )
    }

    fn all_fallback(&self, candidates: &[Candidate], category: &str, city: &str) -> Vec<String> {
        candidates.iter().map(|c| self.fallback_for(c, category, city)).collect()
    }

    /// One pitch per candidate, in order. Never fails: every problem with the
    /// model degrades to fallback text for the affected candidates.
    #[tracing::instrument(skip(self, candidates), fields(batch = candidates.len()))]
    pub async fn pitch_batch(&self, candidates: &[Candidate], category: &str, city: &str, use_ai: bool) -> Vec<String> {
        if candidates.is_empty() {
            return Vec::new();
        }
        if !use_ai {
            return self.all_fallback(candidates, category, city);
        }
        let Some(backend) = &self.backend else {
            debug!("No language model configured; using fallback pitches");
            return self.all_fallback(candidates, category, city);
        };
        let Some(model) = self.selector.resolve(backend.as_ref()).await else {
            return self.all_fallback(candidates, category, city);
        };

        let prompt = build_batch_prompt(&self.policy.batch_prompt, candidates, category, city);
        let reply = match backend.generate(&model, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                let text = e.to_string();
                if is_rate_limited(&text) {
                    warn!("Language model rate limited; using fallback pitches: {}", text);
                } else {
                    error!("Language model call failed; using fallback pitches: {}", text);
                }
                return self.all_fallback(candidates, category, city);
            }
        };

        let parsed = parse_batch_reply(&reply, candidates.len());
        let repaired = parsed.iter().filter(|p| p.is_none()).count();
        if repaired > 0 {
            warn!("{} of {} pitches missing from model reply; using fallback", repaired, candidates.len());
        }

        parsed
            .into_iter()
            .zip(candidates)
            .map(|(pitch, c)| pitch.unwrap_or_else(|| self.fallback_for(c, category, city)))
            .collect()
    }
}
