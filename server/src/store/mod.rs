//! Durable ticket records.
//!
//! The store is the only shared mutable resource. Every write is a single
//! atomic primitive: insert-if-absent keyed on `gateway_payment_id`, and
//! check-in/out as conditional updates on the current `checked_in` value.
//! Callers never read a ticket and then write it back.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{NewTicket, Ticket, TicketCounts};
use crate::utils::error::AppError;

pub use memory::MemoryTicketStore;
pub use postgres::PgTicketStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Ticket),
    /// A ticket already existed for this payment; nothing was written.
    Existing(Ticket),
}

impl InsertOutcome {
    pub fn ticket(&self) -> &Ticket {
        match self {
            InsertOutcome::Inserted(t) | InsertOutcome::Existing(t) => t,
        }
    }

    pub fn into_ticket(self) -> Ticket {
        match self {
            InsertOutcome::Inserted(t) | InsertOutcome::Existing(t) => t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(Ticket),
    /// The ticket exists but was not in the expected state; it is returned unchanged.
    Conflict(Ticket),
    Missing,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_if_absent(&self, ticket: NewTicket) -> Result<InsertOutcome, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Ticket>, AppError>;

    async fn find_by_payment(&self, gateway_payment_id: &str) -> Result<Option<Ticket>, AppError>;

    /// Newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Ticket>, AppError>;

    /// Newest first.
    async fn recent(&self, limit: i64) -> Result<Vec<Ticket>, AppError>;

    /// Sets the check-in fields only if the ticket is not checked in.
    async fn check_in(
        &self,
        id: Uuid,
        admin_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppError>;

    /// Clears the check-in fields only if the ticket is checked in.
    async fn check_out(&self, id: Uuid) -> Result<TransitionOutcome, AppError>;

    async fn counts(&self) -> Result<TicketCounts, AppError>;
}
