use axum::extract::State;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::models::TicketTier;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::response::success;

/// Tier and quantity as the buyer picked them. Any amount the client sends
/// is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub tier: String,
    pub quantity: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Catalogue<'a> {
    tiers: &'a [TicketTier],
    currency: &'a str,
    max_quantity: u32,
}

pub async fn list_tiers(State(state): State<AppState>) -> Response {
    let catalogue = Catalogue {
        tiers: state.orders.pricing().tiers(),
        currency: state.orders.currency(),
        max_quantity: state.orders.max_quantity(),
    };
    success(catalogue, "Ticket tiers")
}

pub async fn quote(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<OrderRequest>,
) -> Result<Response, AppError> {
    let order = state.orders.build_order(&body.tier, body.quantity)?;
    Ok(success(order, "Order priced"))
}
