use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{InsertOutcome, TicketStore, TransitionOutcome};
use crate::models::ticket::TICKET_STATUS_PAID;
use crate::models::{NewTicket, Ticket, TicketCounts};
use crate::utils::error::AppError;

const TICKET_COLUMNS: &str = "id, owner_id, owner_email, gateway_order_id, gateway_payment_id, \
    amount, currency, tier, quantity, unit_price, status, \
    checked_in, checked_in_at, checked_in_by, created_at";

pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn transition_miss(&self, id: Uuid) -> Result<TransitionOutcome, AppError> {
        Ok(match self.get(id).await? {
            Some(ticket) => TransitionOutcome::Conflict(ticket),
            None => TransitionOutcome::Missing,
        })
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn insert_if_absent(&self, ticket: NewTicket) -> Result<InsertOutcome, AppError> {
        let sql = format!(
            "INSERT INTO tickets (id, owner_id, owner_email, gateway_order_id, gateway_payment_id, \
                amount, currency, tier, quantity, unit_price, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (gateway_payment_id) DO NOTHING \
             RETURNING {TICKET_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Ticket>(&sql)
            .bind(Uuid::new_v4())
            .bind(&ticket.owner_id)
            .bind(&ticket.owner_email)
            .bind(&ticket.gateway_order_id)
            .bind(&ticket.gateway_payment_id)
            .bind(ticket.amount)
            .bind(&ticket.currency)
            .bind(&ticket.tier)
            .bind(ticket.quantity)
            .bind(ticket.unit_price)
            .bind(TICKET_STATUS_PAID)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(ticket) = inserted {
            return Ok(InsertOutcome::Inserted(ticket));
        }

        debug!(
            gateway_payment_id = %ticket.gateway_payment_id,
            "Ticket already exists for payment"
        );
        self.find_by_payment(&ticket.gateway_payment_id)
            .await?
            .map(InsertOutcome::Existing)
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "insert conflicted on {} but no row was found",
                    ticket.gateway_payment_id
                ))
            })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_payment(&self, gateway_payment_id: &str) -> Result<Option<Ticket>, AppError> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE gateway_payment_id = $1");
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(gateway_payment_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Ticket>, AppError> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Ticket>, AppError> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn check_in(
        &self,
        id: Uuid,
        admin_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppError> {
        let sql = format!(
            "UPDATE tickets SET checked_in = TRUE, checked_in_at = $2, checked_in_by = $3 \
             WHERE id = $1 AND checked_in = FALSE \
             RETURNING {TICKET_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .bind(at)
            .bind(admin_id)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(ticket) => Ok(TransitionOutcome::Applied(ticket)),
            None => self.transition_miss(id).await,
        }
    }

    async fn check_out(&self, id: Uuid) -> Result<TransitionOutcome, AppError> {
        let sql = format!(
            "UPDATE tickets SET checked_in = FALSE, checked_in_at = NULL, checked_in_by = NULL \
             WHERE id = $1 AND checked_in = TRUE \
             RETURNING {TICKET_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(ticket) => Ok(TransitionOutcome::Applied(ticket)),
            None => self.transition_miss(id).await,
        }
    }

    async fn counts(&self) -> Result<TicketCounts, AppError> {
        let (total, checked_in): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE checked_in) FROM tickets",
        )
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT tier, COUNT(*) FROM tickets GROUP BY tier")
                .fetch_all(&self.pool)
                .await?;

        Ok(TicketCounts {
            total,
            checked_in,
            by_tier: rows.into_iter().collect::<BTreeMap<_, _>>(),
        })
    }
}
