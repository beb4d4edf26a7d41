//! Runtime settings read from the environment (and `.env`, when present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;
use crate::finder::Pagination;
use crate::gemini::DEFAULT_GEMINI_BASE_URL;
use crate::policy::Policy;
use crate::search::DEFAULT_SERPAPI_BASE_URL;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Per-IP request throttling for the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub burst: u32,
    pub period_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: String,
    pub serpapi_api_key: String,
    pub serpapi_base_url: String,
    pub search_language: String,
    pub pagination: Pagination,
    /// Absent key disables AI copy; every lead gets the fallback pitch.
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: Option<String>,
    pub policy_path: Option<PathBuf>,
    /// `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
    pub rate_limit: Option<RateLimit>,
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let serpapi_api_key = get("SERPAPI_API_KEY")
            .ok_or_else(|| AppError::ConfigError("SERPAPI_API_KEY is not set".to_string()))?;

        let defaults = Pagination::default();
        let pagination = Pagination {
            page_size: parse_or(get("SEARCH_PAGE_SIZE"), "SEARCH_PAGE_SIZE", defaults.page_size)?,
            max_offset: parse_or(get("SEARCH_MAX_OFFSET"), "SEARCH_MAX_OFFSET", defaults.max_offset)?,
        };
        if pagination.page_size == 0 {
            return Err(AppError::ConfigError("SEARCH_PAGE_SIZE must be positive".to_string()));
        }

        let rate_limit = match get("RATE_LIMIT_BURST") {
            Some(raw) => {
                let burst: u32 = parse_value(&raw, "RATE_LIMIT_BURST")?;
                let period_secs = parse_or(get("RATE_LIMIT_PERIOD_SECS"), "RATE_LIMIT_PERIOD_SECS", 60u64)?;
                if burst == 0 || period_secs == 0 {
                    return Err(AppError::ConfigError(
                        "RATE_LIMIT_BURST and RATE_LIMIT_PERIOD_SECS must be positive".to_string(),
                    ));
                }
                Some(RateLimit { burst, period_secs })
            }
            None => None,
        };

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS").map(|raw| {
            raw.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect::<Vec<_>>()
        });

        Ok(Settings {
            bind_addr: get("LEADSCOUT_BIND").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            serpapi_api_key,
            serpapi_base_url: get("SERPAPI_BASE_URL").unwrap_or_else(|| DEFAULT_SERPAPI_BASE_URL.to_string()),
            search_language: get("SERPAPI_LANGUAGE").unwrap_or_else(|| "it".to_string()),
            pagination,
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            gemini_model: get("GEMINI_MODEL"),
            policy_path: get("LEADSCOUT_POLICY").map(PathBuf::from),
            cors_allowed_origins,
            rate_limit,
        })
    }

    /// The policy file named by `LEADSCOUT_POLICY`, or the built-in policy.
    pub fn load_policy(&self) -> Result<Policy, AppError> {
        match &self.policy_path {
            Some(path) => Policy::load(path),
            None => Ok(Policy::default()),
        }
    }
}

fn parse_value<T: FromStr>(raw: &str, key: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::ConfigError(format!("{} has an invalid value: {}", key, raw)))
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, AppError> {
    match raw {
        Some(raw) => parse_value(&raw, key),
        None => Ok(default),
    }
}
