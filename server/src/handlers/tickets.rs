use axum::extract::{Path, State};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::models::PaymentCallback;
use crate::services::IssuedTicket;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub tier: String,
    pub quantity: i64,
    pub checkout_token: String,
    #[serde(flatten)]
    pub callback: PaymentCallback,
}

pub async fn issue_ticket(
    State(state): State<AppState>,
    owner: UserSession,
    ApiJson(body): ApiJson<IssueRequest>,
) -> Result<Response, AppError> {
    let order = state.orders.build_order(&body.tier, body.quantity)?;
    let payment = state
        .payments
        .confirm(&order, &body.callback, &body.checkout_token, &owner)?;
    let issued = state.issuer.issue(&order, &payment, &owner).await?;

    Ok(if issued.newly_issued {
        created(issued, "Ticket issued")
    } else {
        success(issued, "Ticket already issued for this payment")
    })
}

pub async fn list_my_tickets(
    State(state): State<AppState>,
    owner: UserSession,
) -> Result<Response, AppError> {
    let owned = state.store.list_by_owner(&owner.user_id).await?;
    let mut tickets: Vec<IssuedTicket> = Vec::with_capacity(owned.len());
    for ticket in owned {
        tickets.push(state.issuer.present(ticket, false).await?);
    }

    Ok(success(tickets, "Tickets retrieved"))
}

pub async fn get_my_ticket(
    State(state): State<AppState>,
    owner: UserSession,
    Path(ticket_id): Path<String>,
) -> Result<Response, AppError> {
    let id = Uuid::parse_str(ticket_id.trim())
        .map_err(|_| AppError::TicketNotFound(ticket_id.clone()))?;
    let ticket = state.admission.lookup(id).await?;
    if ticket.owner_id != owner.user_id {
        return Err(AppError::Forbidden(
            "This ticket belongs to another account".to_string(),
        ));
    }

    let presented = state.issuer.present(ticket, false).await?;
    Ok(success(presented, "Ticket retrieved"))
}
