use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{InsertOutcome, TicketStore, TransitionOutcome};
use crate::models::{NewTicket, Ticket, TicketCounts};
use crate::utils::error::AppError;

#[derive(Default)]
struct Tables {
    tickets: HashMap<Uuid, Ticket>,
    by_payment: HashMap<String, Uuid>,
}

/// Process-local store for development and tests.
///
/// Each mutating call holds the write lock for its whole
/// check-and-write, which gives the same guarantees as the unique index
/// and conditional updates of the Postgres store.
#[derive(Default)]
pub struct MemoryTicketStore {
    tables: RwLock<Tables>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn insert_if_absent(&self, ticket: NewTicket) -> Result<InsertOutcome, AppError> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .by_payment
            .get(&ticket.gateway_payment_id)
            .and_then(|id| tables.tickets.get(id))
        {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }

        let ticket = ticket.into_ticket(Uuid::new_v4(), Utc::now());
        tables
            .by_payment
            .insert(ticket.gateway_payment_id.clone(), ticket.id);
        tables.tickets.insert(ticket.id, ticket.clone());
        Ok(InsertOutcome::Inserted(ticket))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        Ok(self.tables.read().await.tickets.get(&id).cloned())
    }

    async fn find_by_payment(&self, gateway_payment_id: &str) -> Result<Option<Ticket>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_payment
            .get(gateway_payment_id)
            .and_then(|id| tables.tickets.get(id))
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Ticket>, AppError> {
        let tables = self.tables.read().await;
        let mut owned: Vec<Ticket> = tables
            .tickets
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut owned);
        Ok(owned)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Ticket>, AppError> {
        let tables = self.tables.read().await;
        let mut all: Vec<Ticket> = tables.tickets.values().cloned().collect();
        newest_first(&mut all);
        all.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(all)
    }

    async fn check_in(
        &self,
        id: Uuid,
        admin_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppError> {
        let mut tables = self.tables.write().await;
        let Some(ticket) = tables.tickets.get_mut(&id) else {
            return Ok(TransitionOutcome::Missing);
        };
        if ticket.checked_in {
            return Ok(TransitionOutcome::Conflict(ticket.clone()));
        }
        ticket.apply_check_in(admin_id, at);
        Ok(TransitionOutcome::Applied(ticket.clone()))
    }

    async fn check_out(&self, id: Uuid) -> Result<TransitionOutcome, AppError> {
        let mut tables = self.tables.write().await;
        let Some(ticket) = tables.tickets.get_mut(&id) else {
            return Ok(TransitionOutcome::Missing);
        };
        if !ticket.checked_in {
            return Ok(TransitionOutcome::Conflict(ticket.clone()));
        }
        ticket.apply_check_out();
        Ok(TransitionOutcome::Applied(ticket.clone()))
    }

    async fn counts(&self) -> Result<TicketCounts, AppError> {
        let tables = self.tables.read().await;
        let mut counts = TicketCounts::default();
        for ticket in tables.tickets.values() {
            counts.total += 1;
            if ticket.checked_in {
                counts.checked_in += 1;
            }
            *counts.by_tier.entry(ticket.tier.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
