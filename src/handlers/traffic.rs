use crate::core::error::{ApiError, AuthError};
use crate::core::state::AppState;
use crate::models::account::TrafficResponse;
use crate::utils::auth::AuthUser;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

/// GET /user/traffic
///
/// Live read from the daemon. Stats failures surface as 502.
pub async fn traffic_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let user = state
        .users
        .get(auth.user_id)
        .ok_or(AuthError::NotFound)?;

    let report = state.traffic.get_user_traffic(&user.uuid).await?;
    let limit = state
        .tariffs
        .get(report.user.tariff_id)
        .map(|tariff| tariff.traffic_limit)
        .unwrap_or(0);

    Ok((
        StatusCode::OK,
        Json(TrafficResponse {
            traffic: report.traffic,
            limit,
            banned: report.user.is_banned,
        }),
    )
        .into_response())
}
