use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use sw_protocol::HealthResponse;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_owned(),
        timestamp: Utc::now(),
        clients: state.registry.len().await,
    })
}
