use crate::core::state::AppState;
use crate::models::tariff::Tariff;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

/// GET /tariffs
pub async fn tariffs_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tariffs: Vec<Tariff> = state
        .tariffs
        .list()
        .iter()
        .map(|tariff| (**tariff).clone())
        .collect();

    (StatusCode::OK, Json(tariffs))
}
