use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use together_core::TeamStatus;
use together_slack::SharedTeamState;

#[derive(Clone)]
pub struct HealthState {
    team: SharedTeamState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub team: TeamStatus,
    pub checked_at: String,
}

pub fn router(team: SharedTeamState) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { team })
}

pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    let team = state.team.lock().await.status();
    Json(HealthResponse {
        status: "ready",
        service: "together-server",
        team,
        checked_at: Utc::now().to_rfc3339(),
    })
}
