use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub mod classify;
pub mod config;
pub mod dedup;
pub mod entities;
pub mod error;
pub mod finder;
pub mod gemini;
pub mod outreach;
pub mod policy;
pub mod routes;
pub mod search;

use crate::config::{RateLimit, Settings};
use crate::entities::{Lead, WebPresence};
use crate::error::AppError;
use crate::finder::LeadFinder;
use crate::gemini::{GeminiClient, TextModel};
use crate::outreach::PitchGenerator;
use crate::search::SerpApiClient;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub finder: Arc<LeadFinder>,
}

impl AppState {
    pub fn new(finder: LeadFinder) -> Self {
        AppState {
            finder: Arc::new(finder),
        }
    }

    /// Wire the SerpApi and Gemini clients described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let policy = Arc::new(settings.load_policy()?);
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::ConfigError(format!("cannot build HTTP client: {}", e)))?;

        let search = Arc::new(SerpApiClient::new(
            http_client.clone(),
            &settings.serpapi_base_url,
            &settings.serpapi_api_key,
            &settings.search_language,
        ));

        let backend: Option<Arc<dyn TextModel>> = match &settings.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiClient::new(
                http_client,
                &settings.gemini_base_url,
                key,
            ))),
            None => {
                tracing::warn!("GEMINI_API_KEY not set; outreach messages will use templates only");
                None
            }
        };
        let pitcher = Arc::new(PitchGenerator::new(
            backend,
            settings.gemini_model.clone(),
            policy.clone(),
        ));

        Ok(AppState::new(LeadFinder::new(
            search,
            pitcher,
            policy,
            settings.pagination,
        )))
    }
}

/// Cross-cutting HTTP behaviour that depends on deployment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpOptions {
    /// `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimit>,
}

impl From<&Settings> for HttpOptions {
    fn from(settings: &Settings) -> Self {
        HttpOptions {
            cors_allowed_origins: settings.cors_allowed_origins.clone(),
            rate_limit: settings.rate_limit,
        }
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Service is healthy")
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LEADSCOUT API",
        version = "0.1.0",
        description = "Finds local businesses without a proper website and drafts outreach messages for them"
    ),
    paths(
        health_check,
        routes::leads::find_leads
    ),
    components(schemas(
        Lead,
        WebPresence
    ))
)]
pub struct ApiDoc;

/// Turn a handler panic into a JSON 500. Runs inside the request span, so the
/// log line carries the request id.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("Request handler panicked: {}", details);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}

fn cors_layer(origins: Option<&[String]>) -> Result<CorsLayer, AppError> {
    let allow_origin = match origins {
        Some(origins) => {
            let values = origins
                .iter()
                .map(|o| {
                    HeaderValue::from_str(o)
                        .map_err(|_| AppError::ConfigError(format!("invalid CORS origin: {}", o)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            AllowOrigin::list(values)
        }
        None => AllowOrigin::any(),
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]))
}

/// Create the application with all routes and middleware
pub fn create_app(state: AppState, options: &HttpOptions) -> Result<Router, AppError> {
    let api_routes = Router::new()
        .route("/api/v1/leads", get(routes::leads::find_leads))
        .with_state(state);

    let api_routes = match options.rate_limit {
        Some(limit) => {
            let governor_conf = Arc::new(
                GovernorConfigBuilder::default()
                    .key_extractor(SmartIpKeyExtractor)
                    .period(Duration::from_secs(limit.period_secs))
                    .burst_size(limit.burst)
                    .finish()
                    .ok_or_else(|| AppError::ConfigError("invalid rate limit settings".to_string()))?,
            );
            api_routes.layer(GovernorLayer { config: governor_conf })
        }
        None => api_routes,
    };

    let docs_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api-doc/openapi.json", get(openapi_json));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id,
            )
        }))
        .layer(PropagateRequestIdLayer::new(request_id))
        .layer(CatchPanicLayer::custom(handle_panic));

    let app = Router::new()
        .merge(api_routes)
        .merge(docs_routes)
        .layer(middleware)
        .layer(cors_layer(options.cors_allowed_origins.as_deref())?);

    Ok(app)
}
