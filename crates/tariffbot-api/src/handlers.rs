//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! calls into the catalog or the orchestrator, and returns JSON.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use tariffbot_core::duty::{self, TariffBreakdown, TariffInput};
use tariffbot_core::types::{CandidateRecord, HtsCode, Provenance};

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on `limit` for catalog searches.
const MAX_SEARCH_LIMIT: usize = 50;

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

/// Request body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's question.
    pub message: String,
    /// Structured calculation input. When present the question is answered
    /// as a tariff calculation regardless of its wording.
    #[serde(default)]
    pub calculation: Option<TariffInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: Uuid,
    pub answer: String,
    pub provenance: Provenance,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<CandidateRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// `llm_backed` or `fallback_only`.
    pub mode: String,
    pub catalog_records: u64,
    pub indexed_passages: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - liveness plus a summary of what the server can answer from.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let catalog_records = state.catalog.count()?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        mode: state.orchestrator.mode().name().to_string(),
        catalog_records,
        indexed_passages: state.orchestrator.passage_count(),
    }))
}

/// POST /chat - answer one question.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if body.message.trim().is_empty() && body.calculation.is_none() {
        return Err(ApiError::BadRequest(
            "'message' must not be empty".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    let answer = state
        .orchestrator
        .answer_with(&body.message, body.calculation)
        .await;
    info!(%id, provenance = %answer.provenance, "Chat answered");

    Ok(Json(ChatResponse {
        id,
        answer: answer.text,
        provenance: answer.provenance,
        answered_at: Utc::now(),
    }))
}

/// GET /hts/search?q=...&limit=N - ranked catalog candidates for free text.
pub async fn search_hts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let q = params
        .q
        .ok_or_else(|| ApiError::BadRequest("Parameter 'q' is required".to_string()))?;
    if q.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Parameter 'q' must not be empty".to_string(),
        ));
    }

    let limit = search_limit(params.limit, state.config.database.search_limit);
    let results = state.catalog.search(&q, limit)?;
    debug!(query = %q, limit, hits = results.len(), "Catalog search");

    Ok(Json(SearchResponse { results }))
}

/// GET /hts/{code} - one catalog record by exact code.
pub async fn get_hts(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CandidateRecord>, ApiError> {
    let code = HtsCode::parse(&code)?;
    state
        .catalog
        .find_by_code(&code)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No HTS entry for {}", code)))
}

/// POST /tariff/calculate - duty and landed cost for a known code.
pub async fn calculate(
    State(state): State<AppState>,
    Json(input): Json<TariffInput>,
) -> Result<Json<TariffBreakdown>, ApiError> {
    let record = state
        .catalog
        .find_by_code(&input.hts_code)?
        .ok_or_else(|| ApiError::NotFound(format!("No HTS entry for {}", input.hts_code)))?;

    let breakdown = duty::calculate(&record, &input)?;
    info!(
        code = %breakdown.hts_code,
        duty = breakdown.duty_amount,
        column_2 = breakdown.column_2,
        "Tariff calculated"
    );
    Ok(Json(breakdown))
}

fn search_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_SEARCH_LIMIT)
}
