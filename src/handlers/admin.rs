use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::models::account::UserResponse;
use crate::models::admin::{BanRequest, ReloadResponse, SuccessResponse, UserListResponse};
use crate::utils::auth::AdminKey;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::info;

/// List every account
///
/// GET /admin/users
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminKey,
) -> Response {
    let users = state
        .users
        .list()
        .iter()
        .map(|user| UserResponse::from(user.as_ref()))
        .collect();

    (
        StatusCode::OK,
        Json(UserListResponse {
            success: true,
            users,
        }),
    )
        .into_response()
}

/// Ban or unban a user and rebuild the daemon config
///
/// POST /admin/ban/{id} `{"ban": true|false}`
pub async fn ban_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminKey,
    Path(user_id): Path<u32>,
    Json(body): Json<BanRequest>,
) -> Result<Response, ApiError> {
    let user = state.entitlement.set_ban(user_id, body.ban)?;
    let clients = state.sync.apply()?;

    info!(user_id, ban = body.ban, clients, "Admin ban state applied");

    Ok((StatusCode::OK, Json(UserResponse::from(user.as_ref()))).into_response())
}

/// Extend a user's tariff by one month
///
/// POST /admin/renew/{id}
pub async fn renew_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminKey,
    Path(user_id): Path<u32>,
) -> Result<Response, ApiError> {
    let user = state.entitlement.auto_renew(user_id)?;

    Ok((StatusCode::OK, Json(UserResponse::from(user.as_ref()))).into_response())
}

/// Rebuild the daemon config from the user store without restarting
///
/// POST /admin/daemon/reload
pub async fn reload_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminKey,
) -> Result<Response, ApiError> {
    let clients = state.sync.regenerate()?;

    info!(clients, "Daemon config reloaded by admin");

    Ok((
        StatusCode::OK,
        Json(ReloadResponse {
            success: true,
            clients,
        }),
    )
        .into_response())
}

/// Restart the daemon and wait for the result
///
/// POST /admin/daemon/restart
pub async fn restart_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminKey,
) -> Result<Response, ApiError> {
    state.sync.restart().await?;

    Ok((StatusCode::OK, Json(SuccessResponse::new("Daemon restarted"))).into_response())
}
