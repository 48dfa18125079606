use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use super::orders::OrderRequest;
use crate::auth::UserSession;
use crate::models::{Order, PaymentCallback, PaymentSession};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::response::success;

#[derive(Serialize)]
struct CheckoutPayload {
    order: Order,
    payment: PaymentSession,
}

#[derive(Serialize)]
struct VerifyPayload {
    verified: bool,
}

pub async fn create_order(
    State(state): State<AppState>,
    payer: UserSession,
    ApiJson(body): ApiJson<OrderRequest>,
) -> Result<Response, AppError> {
    let order = state.orders.build_order(&body.tier, body.quantity)?;
    let payment = state.payments.create_session(&order, &payer).await?;

    Ok(success(
        CheckoutPayload { order, payment },
        "Payment order created",
    ))
}

/// Answers whether a callback carries a valid gateway signature. Never
/// issues anything.
pub async fn verify(
    State(state): State<AppState>,
    ApiJson(callback): ApiJson<PaymentCallback>,
) -> Response {
    let verified = state.payments.verify_callback(&callback).is_verified();
    let message = if verified {
        "Payment verified"
    } else {
        "Payment could not be verified"
    };
    success(VerifyPayload { verified }, message)
}
