// Centralized error handling for the service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use tracing::error;

/// Errors raised by the user, payment and journal stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to write to journal: {0}")]
    Journal(String),
}

#[derive(Error, Debug)]
pub enum EntitlementError {
    #[error("User {0} not found")]
    UserNotFound(u32),

    #[error("Tariff {0} not found")]
    TariffNotFound(u32),

    #[error("Payment {0} not found")]
    PaymentNotFound(u32),

    #[error("Invalid payment status: {0}")]
    InvalidStatus(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User not found")]
    NotFound,

    #[error("Tariff {0} not found")]
    TariffNotFound(u32),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Token signing failed: {0}")]
    Token(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Failures while rendering, writing or reloading the daemon configuration
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to read template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Document does not match the daemon config schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("Managed inbound not found in daemon config")]
    InboundNotFound,

    #[error("Client {0} not present in daemon config")]
    ClientNotFound(String),

    #[error("Daemon config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Daemon restart failed: {0}")]
    Restart(String),

    #[error("Failed to render client profile: {0}")]
    Profile(String),
}

/// Failures talking to the daemon's statistics interface
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Statistics interface unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed statistics value: {0:?}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum TrafficError {
    #[error("No user with identity token {0}")]
    UnknownToken(String),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
}

/// Client-visible error taxonomy for the HTTP surface
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External failure: {0}")]
    ExternalFailure(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use crate::models::admin::ErrorResponse;

        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ExternalFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(detail) => {
                error!(error = %detail, "Internal error while handling request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(what) => ApiError::Conflict(what),
            StoreError::Journal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<EntitlementError> for ApiError {
    fn from(err: EntitlementError) -> Self {
        match err {
            EntitlementError::UserNotFound(_)
            | EntitlementError::TariffNotFound(_)
            | EntitlementError::PaymentNotFound(_) => ApiError::NotFound(err.to_string()),
            EntitlementError::InvalidStatus(_) => ApiError::InvalidInput(err.to_string()),
            EntitlementError::Store(store) => store.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken => ApiError::Unauthorized,
            AuthError::InvalidInput(_) => ApiError::InvalidInput(err.to_string()),
            AuthError::NotFound | AuthError::TariffNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            AuthError::Hash(detail) | AuthError::Token(detail) => ApiError::Internal(detail),
            AuthError::Store(store) => store.into(),
            AuthError::Sync(sync) => sync.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::ClientNotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::ExternalFailure(other.to_string()),
        }
    }
}

impl From<TrafficError> for ApiError {
    fn from(err: TrafficError) -> Self {
        match err {
            TrafficError::UnknownToken(_) => ApiError::NotFound(err.to_string()),
            TrafficError::Stats(stats) => ApiError::ExternalFailure(stats.to_string()),
            TrafficError::Entitlement(inner) => inner.into(),
        }
    }
}
