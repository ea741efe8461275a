use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthDto {
    status: &'static str,
    uptime_seconds: u64,
    database: &'static str,
    llm_configured: bool,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.db() {
        Some(db) => match db.ping().await {
            Ok(()) => "connected",
            Err(_) => "unhealthy",
        },
        None => "unavailable",
    };

    Json(HealthDto {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
        database,
        llm_configured: state.llm().is_available(),
    })
}
