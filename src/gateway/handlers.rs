//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;

use super::state::AppState;
use super::types::{ApiResponse, error_codes};
use crate::store::WalletStore;

/// Build identifier baked in by `build.rs`
pub const BUILD_VERSION: &str = env!("WALLETX_BUILD");

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
    pub version: &'static str,
}

/// GET /ping
///
/// With a PostgreSQL store the pool is pinged; a failed ping is 503
/// without exposing details.
pub async fn ping<S: WalletStore>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<ApiResponse<PingResponse>>) {
    let timestamp_ms = Utc::now().timestamp_millis();

    let db_health = match &state.pg_db {
        Some(db) => db.health_check().await,
        None => Ok(()),
    };

    if let Err(e) = db_health {
        tracing::error!(error = %e, "[HEALTH] PostgreSQL ping failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                code: error_codes::SERVICE_UNAVAILABLE,
                msg: "unavailable".to_string(),
                error: None,
                data: None,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(PingResponse {
            status: "ok",
            timestamp_ms,
            version: BUILD_VERSION,
        })),
    )
}
