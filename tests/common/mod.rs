// Shared in-memory providers for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use leadscout::entities::Listing;
use leadscout::error::ProviderError;
use leadscout::finder::{LeadFinder, Pagination};
use leadscout::gemini::TextModel;
use leadscout::outreach::PitchGenerator;
use leadscout::policy::Policy;
use leadscout::search::{LocalSearch, SearchQuery};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn listing(name: &str, address: &str, phone: &str, website: Option<&str>) -> Listing {
    Listing {
        title: Some(name.to_string()),
        address: Some(address.to_string()),
        phone: Some(phone.to_string()),
        website: website.map(str::to_string),
        rating: Some(4.2),
        reviews: Some(37),
    }
}

/// `count` distinct website-less listings named `{prefix} {n}`.
pub fn bare_listings(prefix: &str, count: usize) -> Vec<Listing> {
    (0..count)
        .map(|n| listing(&format!("{} {}", prefix, n), &format!("Via Roma {}", n), &format!("+39 02 {:04}", n), None))
        .collect()
}

/// Search provider answering from a fixed table of (category, offset) pages.
#[derive(Default)]
pub struct ScriptedSearch {
    pages: HashMap<(String, u32), Vec<Listing>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, category: &str, offset: u32, listings: Vec<Listing>) -> Self {
        self.pages.insert((category.to_lowercase(), offset), listings);
        self
    }

    pub fn failing(mut self, category: &str) -> Self {
        self.failing.insert(category.to_lowercase());
        self
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalSearch for ScriptedSearch {
    async fn search_page(&self, query: &SearchQuery, offset: u32) -> Result<Vec<Listing>, ProviderError> {
        let category = query.category.to_lowercase();
        self.calls.lock().unwrap().push((category.clone(), offset));
        if self.failing.contains(&category) {
            return Err(ProviderError::Provider("Invalid API key".to_string()));
        }
        Ok(self.pages.get(&(category, offset)).cloned().unwrap_or_default())
    }
}

type ReplyFn = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

/// Language model with a fixed model list and a scripted reply.
pub struct ScriptedModel {
    models: Result<Vec<String>, String>,
    reply: ReplyFn,
    list_delay: Duration,
    pub list_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new<F>(models: &[&str], reply: F) -> Self
    where
        F: Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        ScriptedModel {
            models: Ok(models.iter().map(|m| m.to_string()).collect()),
            reply: Box::new(reply),
            list_delay: Duration::ZERO,
            list_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `reply` regardless of the prompt.
    pub fn replying(models: &[&str], reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(models, move |_| Ok(reply.clone()))
    }

    pub fn unlistable(mut self) -> Self {
        self.models = Err("listing failed".to_string());
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        self.models.clone().map_err(ProviderError::Transport)
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push((model.to_string(), prompt.to_string()));
        (self.reply)(prompt)
    }
}

pub fn finder(search: Arc<ScriptedSearch>, model: Option<Arc<ScriptedModel>>) -> LeadFinder {
    let policy = Arc::new(Policy::default());
    let backend = model.map(|m| m as Arc<dyn TextModel>);
    let pitcher = Arc::new(PitchGenerator::new(backend, None, policy.clone()));
    LeadFinder::new(search, pitcher, policy, Pagination::default())
}
