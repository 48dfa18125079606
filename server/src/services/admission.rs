use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::models::{CredentialPayload, Ticket};
use crate::services::credential::CredentialSigner;
use crate::store::{TicketStore, TransitionOutcome};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionAction {
    CheckIn,
    CheckOut,
}

impl FromStr for AdmissionAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "check_in" => Ok(AdmissionAction::CheckIn),
            "check_out" => Ok(AdmissionAction::CheckOut),
            _ => Err(AppError::ValidationError(
                "Invalid action. Use 'check_in' or 'check_out'".to_string(),
            )),
        }
    }
}

impl fmt::Display for AdmissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionAction::CheckIn => f.write_str("check_in"),
            AdmissionAction::CheckOut => f.write_str("check_out"),
        }
    }
}

/// A scanned credential matched to its stored ticket. The ticket is
/// authoritative; the credential is kept for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResolution {
    pub credential: CredentialPayload,
    pub ticket: Ticket,
}

/// Resolves scanned credentials and runs the check-in/check-out state machine.
///
/// Every transition is a single conditional write in the store, so two
/// simultaneous scans of one ticket cannot both succeed.
pub struct AdmissionController {
    store: Arc<dyn TicketStore>,
    signer: CredentialSigner,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn TicketStore>, signer: CredentialSigner) -> Self {
        Self { store, signer }
    }

    /// Camera capture and a pasted payload both end up here.
    pub async fn resolve(&self, raw: &str) -> Result<ScanResolution, AppError> {
        let credential = CredentialPayload::parse(raw)?;
        self.signer.check(&credential)?;

        let ticket = self.lookup(credential.ticket_id).await?;
        if ticket.gateway_order_id != credential.gateway_order_id
            || ticket.gateway_payment_id != credential.gateway_payment_id
        {
            warn!(
                ticket_id = %ticket.id,
                "Credential references do not match the stored ticket"
            );
            return Err(AppError::MalformedCredential(
                "credential does not match the ticket on record".to_string(),
            ));
        }

        Ok(ScanResolution { credential, ticket })
    }

    pub async fn lookup(&self, ticket_id: Uuid) -> Result<Ticket, AppError> {
        self.store
            .get(ticket_id)
            .await?
            .ok_or_else(|| AppError::TicketNotFound(ticket_id.to_string()))
    }

    pub async fn check_in(&self, ticket_id: Uuid, admin: &AdminSession) -> Result<Ticket, AppError> {
        match self
            .store
            .check_in(ticket_id, &admin.admin_id, Utc::now())
            .await?
        {
            TransitionOutcome::Applied(ticket) => {
                info!(ticket_id = %ticket.id, admin_id = %admin.admin_id, "Ticket checked in");
                Ok(ticket)
            }
            TransitionOutcome::Conflict(ticket) => Err(AppError::AlreadyCheckedIn {
                ticket_id: ticket.id,
                checked_in_at: ticket.checked_in_at,
                checked_in_by: ticket.checked_in_by,
            }),
            TransitionOutcome::Missing => Err(AppError::TicketNotFound(ticket_id.to_string())),
        }
    }

    pub async fn check_out(&self, ticket_id: Uuid, admin: &AdminSession) -> Result<Ticket, AppError> {
        match self.store.check_out(ticket_id).await? {
            TransitionOutcome::Applied(ticket) => {
                info!(ticket_id = %ticket.id, admin_id = %admin.admin_id, "Ticket checked out");
                Ok(ticket)
            }
            TransitionOutcome::Conflict(ticket) => Err(AppError::NotCheckedIn(ticket.id)),
            TransitionOutcome::Missing => Err(AppError::TicketNotFound(ticket_id.to_string())),
        }
    }

    pub async fn apply(
        &self,
        ticket_id: Uuid,
        action: AdmissionAction,
        admin: &AdminSession,
    ) -> Result<Ticket, AppError> {
        match action {
            AdmissionAction::CheckIn => self.check_in(ticket_id, admin).await,
            AdmissionAction::CheckOut => self.check_out(ticket_id, admin).await,
        }
    }

    pub async fn scan_and_apply(
        &self,
        raw: &str,
        action: AdmissionAction,
        admin: &AdminSession,
    ) -> Result<Ticket, AppError> {
        let resolution = self.resolve(raw).await?;
        self.apply(resolution.ticket.id, action, admin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTicket;
    use crate::store::MemoryTicketStore;

    const SECRET: &str = "credential-secret";

    fn admin(id: &str) -> AdminSession {
        AdminSession {
            admin_id: id.into(),
        }
    }

    async fn seeded() -> (AdmissionController, Ticket) {
        let store = Arc::new(MemoryTicketStore::new());
        let ticket = store
            .insert_if_absent(NewTicket {
                owner_id: "user-1".into(),
                owner_email: None,
                gateway_order_id: "order_A".into(),
                gateway_payment_id: "pay_A".into(),
                amount: 1000,
                currency: "INR".into(),
                tier: "Solo".into(),
                quantity: 2,
                unit_price: 500,
            })
            .await
            .unwrap()
            .into_ticket();
        let controller = AdmissionController::new(store, CredentialSigner::new(Some(SECRET)));
        (controller, ticket)
    }

    fn signed_credential(ticket: &Ticket) -> String {
        let mut payload = CredentialPayload::from_ticket(ticket);
        CredentialSigner::new(Some(SECRET)).sign(&mut payload);
        payload.encode().unwrap()
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("check_in".parse::<AdmissionAction>().unwrap(), AdmissionAction::CheckIn);
        assert_eq!("check_out".parse::<AdmissionAction>().unwrap(), AdmissionAction::CheckOut);
        let err = "enter".parse::<AdmissionAction>().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_scan_then_check_in_once() {
        let (controller, ticket) = seeded().await;
        let raw = signed_credential(&ticket);

        let first = controller
            .scan_and_apply(&raw, AdmissionAction::CheckIn, &admin("gate-1"))
            .await
            .unwrap();
        assert!(first.checked_in);
        assert_eq!(first.checked_in_by.as_deref(), Some("gate-1"));

        let err = controller
            .scan_and_apply(&raw, AdmissionAction::CheckIn, &admin("gate-2"))
            .await
            .unwrap_err();
        match err {
            AppError::AlreadyCheckedIn {
                checked_in_at,
                checked_in_by,
                ..
            } => {
                assert_eq!(checked_in_at, first.checked_in_at);
                assert_eq!(checked_in_by.as_deref(), Some("gate-1"));
            }
            other => panic!("expected AlreadyCheckedIn, got {other:?}"),
        }

        let stored = controller.lookup(ticket.id).await.unwrap();
        assert_eq!(stored.checked_in_at, first.checked_in_at);
    }

    #[tokio::test]
    async fn test_check_out_clears_audit_fields() {
        let (controller, ticket) = seeded().await;
        let gate = admin("gate-1");

        let err = controller.check_out(ticket.id, &gate).await.unwrap_err();
        assert!(matches!(err, AppError::NotCheckedIn(id) if id == ticket.id));

        controller.check_in(ticket.id, &gate).await.unwrap();
        let out = controller.check_out(ticket.id, &gate).await.unwrap();
        assert!(!out.checked_in);
        assert!(out.checked_in_at.is_none());
        assert!(out.checked_in_by.is_none());

        let again = controller.check_in(ticket.id, &gate).await.unwrap();
        assert!(again.checked_in);
    }

    #[tokio::test]
    async fn test_simultaneous_scans_admit_once() {
        let (controller, ticket) = seeded().await;
        let controller = Arc::new(controller);
        let id = ticket.id;

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let controller = controller.clone();
                tokio::spawn(async move {
                    controller
                        .check_in(id, &admin(&format!("gate-{i}")))
                        .await
                })
            })
            .collect();

        let mut admitted = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(AppError::AlreadyCheckedIn { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(conflicts, 19);
    }

    #[tokio::test]
    async fn test_tampered_credential_is_malformed() {
        let (controller, ticket) = seeded().await;

        let mut forged = CredentialPayload::from_ticket(&ticket);
        forged.sig = Some("00".repeat(32));
        let err = controller.resolve(&forged.encode().unwrap()).await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_CREDENTIAL");

        let err = controller.resolve("{not json").await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_CREDENTIAL");
    }

    #[tokio::test]
    async fn test_credential_for_other_payment_is_malformed() {
        let (controller, ticket) = seeded().await;
        let mut payload = CredentialPayload::from_ticket(&ticket);
        payload.gateway_payment_id = "pay_other".into();
        CredentialSigner::new(Some(SECRET)).sign(&mut payload);

        let err = controller.resolve(&payload.encode().unwrap()).await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_CREDENTIAL");
    }

    #[tokio::test]
    async fn test_unknown_ticket_is_not_found() {
        let (controller, ticket) = seeded().await;
        let mut ghost = ticket.clone();
        ghost.id = Uuid::new_v4();

        let err = controller.resolve(&signed_credential(&ghost)).await.unwrap_err();
        assert_eq!(err.code(), "TICKET_NOT_FOUND");

        let err = controller
            .check_in(Uuid::new_v4(), &admin("gate-1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TICKET_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_display_fields_in_credential_are_not_trusted() {
        let (controller, ticket) = seeded().await;
        let mut payload = CredentialPayload::from_ticket(&ticket);
        payload.amount = 1;
        payload.tier = Some("Group".into());
        CredentialSigner::new(Some(SECRET)).sign(&mut payload);

        let resolution = controller.resolve(&payload.encode().unwrap()).await.unwrap();
        assert_eq!(resolution.ticket.amount, 1000);
        assert_eq!(resolution.ticket.tier, "Solo");
    }
}
