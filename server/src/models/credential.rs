use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ticket::Ticket;
use crate::utils::error::AppError;

/// Upper bound on what we are willing to parse from a scanner.
pub const MAX_CREDENTIAL_BYTES: usize = 1024;

/// The content of a ticket's QR code.
///
/// Only `ticket_id` is used to locate the record; everything else is
/// display material, plus `sig` for tamper evidence. Unknown keys are
/// ignored and the snake_case keys of older tickets are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPayload {
    #[serde(alias = "id", alias = "ticket_id")]
    pub ticket_id: Uuid,
    #[serde(alias = "order_id")]
    pub gateway_order_id: String,
    #[serde(alias = "payment_id")]
    pub gateway_payment_id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "ticket_count")]
    pub quantity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "created_at")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

impl CredentialPayload {
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id,
            gateway_order_id: ticket.gateway_order_id.clone(),
            gateway_payment_id: ticket.gateway_payment_id.clone(),
            amount: ticket.amount,
            currency: ticket.currency.clone(),
            tier: Some(ticket.tier.clone()),
            quantity: Some(ticket.quantity),
            issued_at: Some(ticket.created_at),
            sig: None,
        }
    }

    /// Bytes covered by `sig`.
    pub fn signing_message(&self) -> String {
        format!(
            "{}|{}|{}",
            self.ticket_id, self.gateway_order_id, self.gateway_payment_id
        )
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::MalformedCredential(
                "credential payload is empty".to_string(),
            ));
        }
        if raw.len() > MAX_CREDENTIAL_BYTES {
            return Err(AppError::MalformedCredential(format!(
                "credential payload exceeds {MAX_CREDENTIAL_BYTES} bytes"
            )));
        }

        let payload: Self = serde_json::from_str(raw)
            .map_err(|e| AppError::MalformedCredential(format!("unreadable payload: {e}")))?;

        if payload.gateway_order_id.is_empty() || payload.gateway_payment_id.is_empty() {
            return Err(AppError::MalformedCredential(
                "credential is missing gateway references".to_string(),
            ));
        }

        Ok(payload)
    }

    pub fn encode(&self) -> Result<String, AppError> {
        serde_json::to_string(self)
            .map_err(|e| AppError::InternalServerError(format!("credential encoding: {e}")))
    }
}
