use crate::core::error::{ApiError, AuthError, SyncError};
use crate::core::state::AppState;
use crate::daemon::profile::ClientProfile;
use crate::utils::auth::AuthUser;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::io::ErrorKind;
use std::sync::Arc;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const YAML: &str = "application/yaml; charset=utf-8";

/// GET /subscription.txt
///
/// Shared subscription file, one link per active user.
pub async fn subscription_file_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let text = state.sync.subscription().map_err(|e| match e {
        SyncError::Io(io) if io.kind() == ErrorKind::NotFound => {
            ApiError::NotFound("subscription file has not been written yet".to_string())
        }
        other => other.into(),
    })?;

    Ok((StatusCode::OK, [(CONTENT_TYPE, TEXT_PLAIN)], text).into_response())
}

fn profile(state: &AppState, user_id: u32) -> Result<ClientProfile, ApiError> {
    let user = state.users.get(user_id).ok_or(AuthError::NotFound)?;
    Ok(state.sync.client_profile(&user)?)
}

/// GET /user/subscription
pub async fn user_subscription_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let line = profile(&state, auth.user_id)?.subscription_line();

    Ok((StatusCode::OK, [(CONTENT_TYPE, TEXT_PLAIN)], line).into_response())
}

/// GET /user/config
pub async fn user_config_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let profile = profile(&state, auth.user_id)?;

    Ok((StatusCode::OK, Json(profile)).into_response())
}

/// GET /user/hiddify-config
pub async fn hiddify_config_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let yaml = profile(&state, auth.user_id)?
        .clash_yaml()
        .map_err(|e| ApiError::from(SyncError::Profile(e.to_string())))?;

    Ok((StatusCode::OK, [(CONTENT_TYPE, YAML)], yaml).into_response())
}
