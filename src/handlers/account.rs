use crate::core::error::{ApiError, AuthError};
use crate::core::state::AppState;
use crate::models::account::{
    ChangeTariffRequest, CheckTokenResponse, LinkTelegramRequest, LoginRequest, MeResponse,
    PasswordResetRequest, RegisterRequest, TokenResponse, UserResponse,
};
use crate::models::admin::SuccessResponse;
use crate::utils::auth::AuthUser;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

/// POST /register
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let user = state.auth.register(&body.email, &body.password)?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user.as_ref()))).into_response())
}

/// POST /login
///
/// Accepts `{email, password}` or `{telegram_id}`.
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let token = match body.telegram_id {
        Some(telegram_id) if telegram_id != 0 => state.auth.login_telegram(telegram_id)?,
        _ => state.auth.login(&body.email, &body.password)?,
    };

    Ok((StatusCode::OK, Json(TokenResponse { token })).into_response())
}

/// GET /user/me
///
/// Traffic is read live; if the stats interface is down the stored counter
/// is reported instead.
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let user = state
        .users
        .get(auth.user_id)
        .ok_or(AuthError::NotFound)?;

    let user = match state.traffic.get_user_traffic(&user.uuid).await {
        Ok(report) => report.user,
        Err(e) => {
            warn!(user_id = user.id, error = %e, "Live traffic read failed, using stored counter");
            user
        }
    };

    Ok((
        StatusCode::OK,
        Json(MeResponse {
            id: user.id,
            email: user.email.clone(),
            uuid: user.uuid.clone(),
            tariff_id: user.tariff_id,
            traffic: user.used_traffic,
            expires_at: user.tariff_expires_at,
            is_banned: user.is_banned,
        }),
    )
        .into_response())
}

/// GET /user/check-token
pub async fn check_token_handler(auth: AuthUser) -> Response {
    (
        StatusCode::OK,
        Json(CheckTokenResponse {
            user_id: auth.user_id,
        }),
    )
        .into_response()
}

/// POST /user/change-tariff
pub async fn change_tariff_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<ChangeTariffRequest>,
) -> Result<Response, ApiError> {
    let user = state.entitlement.change_tariff(auth.user_id, body.tariff_id)?;

    // the tariff id is the client level in the daemon config
    state.sync.apply()?;

    Ok((StatusCode::OK, Json(UserResponse::from(user.as_ref()))).into_response())
}

/// POST /user/link-telegram
pub async fn link_telegram_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<LinkTelegramRequest>,
) -> Result<Response, ApiError> {
    state.auth.link_telegram(auth.user_id, body.telegram_id)?;

    Ok((StatusCode::OK, Json(SuccessResponse::new("Telegram account linked"))).into_response())
}

/// POST /user/delete-account
pub async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    state.auth.delete_account(auth.user_id)?;

    Ok((StatusCode::OK, Json(SuccessResponse::new("Account deleted"))).into_response())
}

/// POST /user/request-password-reset
pub async fn request_password_reset_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<PasswordResetRequest>,
) -> Response {
    info!(user_id = auth.user_id, "Password reset request received");
    state.auth.request_password_reset(&body.email);

    (
        StatusCode::OK,
        Json(SuccessResponse::new("password reset initiated")),
    )
        .into_response()
}
