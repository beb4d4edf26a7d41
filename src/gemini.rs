//! Google Generative Language (Gemini) REST client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::ProviderError;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const GENERATE_CONTENT: &str = "generateContent";

/// A text-generation backend that can enumerate its models.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Model identifiers usable for generation, without the `models/` prefix.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Strip the `models/` resource prefix Gemini puts on identifiers.
pub fn bare_model_name(name: &str) -> &str {
    name.trim().strip_prefix("models/").unwrap_or(name.trim())
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        GeminiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
        error!("Gemini API Error - Status: {}, Body: {}", status, body);
        Err(ProviderError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("key", self.api_key.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = Self::checked(request.send().await?).await?;
            let page = response.json::<ModelList>().await?;

            names.extend(
                page.models
                    .into_iter()
                    .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_CONTENT))
                    .map(|m| bare_model_name(&m.name).to_string()),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!("Gemini lists {} generation models", names.len());
        Ok(names)
    }

    #[tracing::instrument(skip(self, model, prompt), fields(model = %model, prompt_len = prompt.len()))]
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:{}",
            self.base_url,
            bare_model_name(model),
            GENERATE_CONTENT
        );
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let response = Self::checked(response).await?;
        let payload = response.json::<GenerateResponse>().await?;

        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::Decode("Gemini returned no candidate text".to_string()));
        }

        debug!("Gemini reply length: {}", text.len());
        Ok(text)
    }
}
