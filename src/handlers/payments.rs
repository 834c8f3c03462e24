use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::models::payment::{CreatePaymentRequest, Payment, UpdatePaymentStatusRequest};
use crate::utils::auth::AuthUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

/// GET /user/payments
pub async fn list_payments_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Response, ApiError> {
    let payments: Vec<Payment> = state
        .entitlement
        .list_payments(auth.user_id)?
        .iter()
        .map(|payment| (**payment).clone())
        .collect();

    Ok((StatusCode::OK, Json(payments)).into_response())
}

/// POST /user/payments
///
/// Records a pending payment. The tariff is not activated by this call.
pub async fn create_payment_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<Response, ApiError> {
    if body.amount <= 0 {
        return Err(ApiError::InvalidInput("amount must be positive".to_string()));
    }

    let payment = state.entitlement.record_payment(
        auth.user_id,
        body.amount,
        body.tariff_id,
        &body.payment_method,
    )?;

    Ok((StatusCode::CREATED, Json(payment.as_ref().clone())).into_response())
}

/// GET /user/payments/{id}
pub async fn get_payment_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(payment_id): Path<u32>,
) -> Result<Response, ApiError> {
    let payment = state.entitlement.get_payment(auth.user_id, payment_id)?;

    Ok((StatusCode::OK, Json(payment.as_ref().clone())).into_response())
}

/// PUT /user/payments/{id}
pub async fn update_payment_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(payment_id): Path<u32>,
    Json(body): Json<UpdatePaymentStatusRequest>,
) -> Result<Response, ApiError> {
    let payment = state
        .entitlement
        .update_payment_status(auth.user_id, payment_id, &body.status)?;

    Ok((StatusCode::OK, Json(payment.as_ref().clone())).into_response())
}
