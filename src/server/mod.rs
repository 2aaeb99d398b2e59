//! HTTP API over the trend cache and the site scrapers

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::aggregator::PER_SITE_LIMIT;
use crate::models::ProductRecord;
use crate::trend_finder::TrendFinder;

pub fn router(finder: TrendFinder) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/trendz", get(get_trendz).post(refresh_trendz))
        .route(
            "/api/scrappe/myntra",
            get(scrape_myntra_query).post(scrape_myntra_body),
        )
        .layer(Extension(finder))
        .layer(CorsLayer::permissive())
}

#[derive(Debug, Deserialize)]
pub struct TrendzParams {
    query: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendzResponse {
    search_query: String,
    products: Vec<ProductRecord>,
    total_products: usize,
    last_scraped: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    query: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    message: String,
    search_query: String,
    products: Vec<ProductRecord>,
    total_products: usize,
}

#[derive(Debug, Deserialize)]
pub struct SiteScrapeParams {
    q: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SiteScrapeRequest {
    query: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteScrapeResponse {
    success: bool,
    search_query: String,
    total_products: usize,
    products: Vec<ProductRecord>,
    scraped_at: DateTime<Utc>,
}

type ApiError = (StatusCode, Json<Value>);

fn missing_query() -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "Missing required parameter: query"})),
    )
}

fn not_found(query: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "No products found",
            "message": format!("Scraping returned no products for '{query}'"),
            "products": [],
        })),
    )
}

fn internal_error(e: &anyhow::Error) -> ApiError {
    error!("Request failed: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Internal server error"})),
    )
}

fn require_query(raw: Option<String>) -> Result<String, ApiError> {
    match raw {
        Some(query) if !query.trim().is_empty() => Ok(query.trim().to_string()),
        _ => Err(missing_query()),
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "trend-finder"}))
}

async fn get_trendz(
    Extension(finder): Extension<TrendFinder>,
    Query(params): Query<TrendzParams>,
) -> Result<Json<TrendzResponse>, ApiError> {
    let query = require_query(params.query)?;

    match finder.trends_for(&query).await {
        Ok(Some(entry)) => Ok(Json(TrendzResponse {
            search_query: entry.search_query,
            total_products: entry.products.len(),
            last_scraped: entry.updated_at,
            products: entry.products,
        })),
        Ok(None) => Err(not_found(&query)),
        Err(e) => Err(internal_error(&e)),
    }
}

async fn refresh_trendz(
    Extension(finder): Extension<TrendFinder>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let query = require_query(body.query)?;

    match finder.force_refresh(&query).await {
        Ok(Some(entry)) => Ok(Json(RefreshResponse {
            message: format!(
                "Scraped {} products for '{}'",
                entry.products.len(),
                entry.search_query
            ),
            search_query: entry.search_query,
            total_products: entry.products.len(),
            products: entry.products,
        })),
        Ok(None) => Err(not_found(&query)),
        Err(e) => Err(internal_error(&e)),
    }
}

async fn scrape_myntra_query(
    Extension(finder): Extension<TrendFinder>,
    Query(params): Query<SiteScrapeParams>,
) -> Result<Json<SiteScrapeResponse>, ApiError> {
    let query = require_query(params.q)?;
    myntra_scrape(finder, query, params.limit).await
}

async fn scrape_myntra_body(
    Extension(finder): Extension<TrendFinder>,
    Json(body): Json<SiteScrapeRequest>,
) -> Result<Json<SiteScrapeResponse>, ApiError> {
    let query = require_query(body.query)?;
    myntra_scrape(finder, query, body.limit).await
}

async fn myntra_scrape(
    finder: TrendFinder,
    query: String,
    limit: Option<usize>,
) -> Result<Json<SiteScrapeResponse>, ApiError> {
    let limit = limit.unwrap_or(PER_SITE_LIMIT).min(100);

    match finder.scrape_site("Myntra", &query, limit).await {
        Ok(products) => Ok(Json(SiteScrapeResponse {
            success: true,
            search_query: query,
            total_products: products.len(),
            products,
            scraped_at: Utc::now(),
        })),
        Err(e) => {
            error!("Myntra scrape failed for '{}': {:#}", query, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Scraping failed"})),
            ))
        }
    }
}
