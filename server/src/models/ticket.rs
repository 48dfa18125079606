use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment-level status stored on every issued ticket.
pub const TICKET_STATUS_PAID: &str = "paid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    NotCheckedIn,
    CheckedIn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub owner_id: String,
    pub owner_email: Option<String>,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub amount: i64,
    pub currency: String,
    pub tier: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub status: String,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn admission_state(&self) -> AdmissionState {
        if self.checked_in {
            AdmissionState::CheckedIn
        } else {
            AdmissionState::NotCheckedIn
        }
    }

    /// `checked_in_at` and `checked_in_by` are set exactly when `checked_in` is.
    pub fn audit_fields_consistent(&self) -> bool {
        self.checked_in == self.checked_in_at.is_some()
            && self.checked_in == self.checked_in_by.is_some()
    }

    pub(crate) fn apply_check_in(&mut self, admin_id: &str, at: DateTime<Utc>) {
        self.checked_in = true;
        self.checked_in_at = Some(at);
        self.checked_in_by = Some(admin_id.to_string());
    }

    pub(crate) fn apply_check_out(&mut self) {
        self.checked_in = false;
        self.checked_in_at = None;
        self.checked_in_by = None;
    }
}

/// Everything the issuer knows before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub owner_id: String,
    pub owner_email: Option<String>,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub amount: i64,
    pub currency: String,
    pub tier: String,
    pub quantity: i32,
    pub unit_price: i64,
}

impl NewTicket {
    pub fn into_ticket(self, id: Uuid, created_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id,
            owner_id: self.owner_id,
            owner_email: self.owner_email,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            amount: self.amount,
            currency: self.currency,
            tier: self.tier,
            quantity: self.quantity,
            unit_price: self.unit_price,
            status: TICKET_STATUS_PAID.to_string(),
            checked_in: false,
            checked_in_at: None,
            checked_in_by: None,
            created_at,
        }
    }
}
