//! API route handlers.
//!
//! Read-only views over the integrated store.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::race_id::RaceId;
use crate::storage::IntegratedStore;
use crate::types::{DateRacesResponse, ErrorResponse, HealthResponse};

/// Application state shared across handlers.
pub struct AppState {
    pub store: IntegratedStore,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Integrated record for one race.
pub async fn get_race(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let race_id: RaceId = race_id
        .parse()
        .map_err(|e: crate::error::IntegrateError| ApiError::bad_request(e.to_string()))?;

    match state.store.load(&race_id) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(ApiError::not_found(format!("No integrated record for {}", race_id))),
        Err(e) => Err(ApiError::internal(format!("Failed to read {}: {}", race_id, e))),
    }
}

/// Race ids with an integrated file for a date.
pub async fn list_date_races(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<DateRacesResponse>, ApiError> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::bad_request("Date must be YYYYMMDD"));
    }

    let race_ids = state.store.race_ids_for_date(&date);
    Ok(Json(DateRacesResponse { date, race_ids }))
}

/// Routes without middleware layers
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/races/:race_id", get(get_race))
        .route("/dates/:date/races", get(list_date_races))
        .with_state(state)
}
