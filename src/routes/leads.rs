use axum::{
    extract::{Query, State},
    Json,
};
use tracing::info;

use crate::entities::Lead;
use crate::error::AppError;
use crate::finder::{
    country_or_default, normalize_categories, LeadRequest, DEFAULT_LIMIT, MAX_LIMIT, MIN_LIMIT,
};
use crate::AppState;

fn parse_flag(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(AppError::InvalidRequest(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

/// Validate raw query pairs into a [`LeadRequest`].
///
/// `category` may repeat and may hold comma-separated values; other keys use
/// their last occurrence. Unknown keys are ignored.
pub fn parse_lead_request(pairs: &[(String, String)], default_category: &str) -> Result<LeadRequest, AppError> {
    let mut city: Option<String> = None;
    let mut country: Option<String> = None;
    let mut raw_categories: Vec<&str> = Vec::new();
    let mut limit = DEFAULT_LIMIT;
    let mut include_with_website = false;
    let mut use_ai = true;

    for (key, value) in pairs {
        match key.as_str() {
            "city" => city = Some(value.trim().to_string()),
            "country" => country = Some(value.clone()),
            "category" => raw_categories.push(value),
            "limit" => {
                limit = value.trim().parse::<usize>().map_err(|_| {
                    AppError::InvalidRequest(format!("limit must be an integer, got '{}'", value))
                })?;
            }
            "include_with_website" => include_with_website = parse_flag(key, value)?,
            "ai" => use_ai = parse_flag(key, value)?,
            _ => {}
        }
    }

    let city = city
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("city is required".to_string()))?;

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::InvalidRequest(format!(
            "limit must be between {} and {}",
            MIN_LIMIT, MAX_LIMIT
        )));
    }

    Ok(LeadRequest {
        city,
        country: country_or_default(country.as_deref()),
        categories: normalize_categories(&raw_categories, default_category),
        limit,
        include_with_website,
        use_ai,
    })
}

/// Find local businesses without a proper website and draft an outreach message for each
#[utoipa::path(
    get,
    path = "/api/v1/leads",
    tag = "Leads",
    params(
        ("city" = String, Query, description = "City to search in"),
        ("category" = Option<String>, Query, description = "Business category; repeat or comma-separate for up to 3"),
        ("limit" = Option<usize>, Query, description = "Number of leads to return, 1-50 (default: 10)"),
        ("country" = Option<String>, Query, description = "Country appended to the search (default: Italia)"),
        ("include_with_website" = Option<bool>, Query, description = "Also return businesses that have their own website (default: false)"),
        ("ai" = Option<bool>, Query, description = "Use the language model for messages; false uses templates only (default: true)")
    ),
    responses(
        (status = 200, description = "Leads found", body = Vec<Lead>),
        (status = 422, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip(state, params))]
pub async fn find_leads(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Lead>>, AppError> {
    let request = parse_lead_request(&params, &state.finder.policy().default_category)?;
    info!(
        "Lead search: city={} country={} categories={:?} limit={} ai={}",
        request.city, request.country, request.categories, request.limit, request.use_ai
    );

    let leads = state.finder.find_leads(&request).await;
    Ok(Json(leads))
}
