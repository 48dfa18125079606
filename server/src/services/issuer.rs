use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::UserSession;
use crate::models::{CredentialPayload, NewTicket, Order, Ticket, VerifiedPayment};
use crate::services::credential::{png_data_url, CredentialCodec, CredentialSigner};
use crate::store::{InsertOutcome, TicketStore};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTicket {
    pub ticket: Ticket,
    /// Text encoded in the QR code.
    pub credential: String,
    /// PNG data URL, absent when rendering failed.
    pub qr_code: Option<String>,
    pub newly_issued: bool,
}

/// Turns a verified payment into exactly one ticket.
pub struct TicketIssuer {
    store: Arc<dyn TicketStore>,
    signer: CredentialSigner,
    codec: Arc<dyn CredentialCodec>,
}

impl TicketIssuer {
    pub fn new(
        store: Arc<dyn TicketStore>,
        signer: CredentialSigner,
        codec: Arc<dyn CredentialCodec>,
    ) -> Self {
        Self {
            store,
            signer,
            codec,
        }
    }

    /// Idempotent on the gateway payment id: a replay returns the ticket
    /// issued the first time, with `newly_issued == false`.
    pub async fn issue(
        &self,
        order: &Order,
        payment: &VerifiedPayment,
        owner: &UserSession,
    ) -> Result<IssuedTicket, AppError> {
        if payment.amount() != order.total_amount()
            || !payment.currency().eq_ignore_ascii_case(order.currency())
        {
            return Err(AppError::PaymentRejected(format!(
                "payment {} covers {} {} but order totals {} {}",
                payment.gateway_payment_id(),
                payment.amount(),
                payment.currency(),
                order.total_amount(),
                order.currency()
            )));
        }

        if let Some(existing) = self.store.find_by_payment(payment.gateway_payment_id()).await? {
            ensure_owner(&existing, owner)?;
            info!(
                ticket_id = %existing.id,
                gateway_payment_id = %existing.gateway_payment_id,
                "Returning previously issued ticket"
            );
            return self.present(existing, false).await;
        }

        let quantity = i32::try_from(order.quantity()).map_err(|_| {
            AppError::InternalServerError(format!("quantity {} overflows", order.quantity()))
        })?;

        let new_ticket = NewTicket {
            owner_id: owner.user_id.clone(),
            owner_email: owner.email.clone(),
            gateway_order_id: payment.gateway_order_id().to_string(),
            gateway_payment_id: payment.gateway_payment_id().to_string(),
            amount: order.total_amount(),
            currency: order.currency().to_string(),
            tier: order.tier().to_string(),
            quantity,
            unit_price: order.unit_price(),
        };

        match self.store.insert_if_absent(new_ticket).await? {
            InsertOutcome::Inserted(ticket) => {
                info!(
                    ticket_id = %ticket.id,
                    user_id = %ticket.owner_id,
                    tier = %ticket.tier,
                    quantity = ticket.quantity,
                    amount = ticket.amount,
                    "Ticket issued"
                );
                self.present(ticket, true).await
            }
            InsertOutcome::Existing(ticket) => {
                ensure_owner(&ticket, owner)?;
                self.present(ticket, false).await
            }
        }
    }

    /// Rendering runs on the blocking pool.
    pub async fn present(
        &self,
        ticket: Ticket,
        newly_issued: bool,
    ) -> Result<IssuedTicket, AppError> {
        let credential = self.credential_for(&ticket).encode()?;

        let codec = self.codec.clone();
        let text = credential.clone();
        let qr_code = match tokio::task::spawn_blocking(move || codec.encode(&text)).await {
            Ok(Ok(png)) => Some(png_data_url(&png)),
            Ok(Err(e)) => {
                warn!(ticket_id = %ticket.id, error = %e, "QR rendering failed");
                None
            }
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "QR rendering task failed");
                None
            }
        };
        Ok(IssuedTicket {
            ticket,
            credential,
            qr_code,
            newly_issued,
        })
    }

    pub fn credential_for(&self, ticket: &Ticket) -> CredentialPayload {
        let mut payload = CredentialPayload::from_ticket(ticket);
        self.signer.sign(&mut payload);
        payload
    }
}

fn ensure_owner(ticket: &Ticket, owner: &UserSession) -> Result<(), AppError> {
    if ticket.owner_id != owner.user_id {
        warn!(
            ticket_id = %ticket.id,
            user_id = %owner.user_id,
            "Payment already redeemed by another account"
        );
        return Err(AppError::Forbidden(
            "This payment belongs to another account".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::models::{PaymentCallback, TicketTier};
    use crate::services::credential::{CodecError, QrCodec};
    use crate::services::order::OrderBuilder;
    use crate::services::payment::PaymentSessionManager;
    use crate::services::pricing::PricingTable;
    use crate::store::MemoryTicketStore;

    const GATEWAY_SECRET: &str = "gateway-secret";

    struct BrokenCodec;

    impl CredentialCodec for BrokenCodec {
        fn encode(&self, _: &str) -> Result<Vec<u8>, CodecError> {
            Err(CodecError::Encode("renderer offline".into()))
        }

        fn decode(&self, _: &[u8]) -> Result<Option<String>, CodecError> {
            Ok(None)
        }
    }

    /// Records the thread it renders on.
    struct ThreadRecordingCodec {
        rendered_on: std::sync::Mutex<Option<std::thread::ThreadId>>,
    }

    impl CredentialCodec for ThreadRecordingCodec {
        fn encode(&self, payload: &str) -> Result<Vec<u8>, CodecError> {
            if let Ok(mut slot) = self.rendered_on.lock() {
                *slot = Some(std::thread::current().id());
            }
            Ok(payload.as_bytes().to_vec())
        }

        fn decode(&self, _: &[u8]) -> Result<Option<String>, CodecError> {
            Ok(None)
        }
    }

    struct Harness {
        store: Arc<MemoryTicketStore>,
        orders: OrderBuilder,
        payments: PaymentSessionManager,
    }

    impl Harness {
        fn new() -> Self {
            let pricing = PricingTable::new(vec![
                TicketTier::new("Solo", 500),
                TicketTier::new("Couple", 900),
            ])
            .unwrap();
            Self {
                store: Arc::new(MemoryTicketStore::new()),
                orders: OrderBuilder::new(Arc::new(pricing), 10, "INR"),
                payments: PaymentSessionManager::new(
                    Arc::new(MockGateway::new()),
                    Some(GATEWAY_SECRET),
                ),
            }
        }

        fn issuer(&self, codec: Arc<dyn CredentialCodec>) -> TicketIssuer {
            TicketIssuer::new(
                self.store.clone(),
                CredentialSigner::new(Some("credential-secret")),
                codec,
            )
        }

        async fn paid(&self, tier: &str, quantity: i64, payer: &UserSession) -> (Order, VerifiedPayment) {
            let order = self.orders.build_order(tier, quantity).unwrap();
            let session = self.payments.create_session(&order, payer).await.unwrap();
            let payment_id = format!("pay_{}", uuid::Uuid::new_v4().simple());
            let callback = PaymentCallback {
                gateway_order_id: Some(session.gateway_order_id().to_string()),
                gateway_payment_id: Some(payment_id.clone()),
                signature: self
                    .payments
                    .sign_callback(session.gateway_order_id(), &payment_id),
            };
            let proof = self
                .payments
                .confirm(&order, &callback, session.checkout_token(), payer)
                .unwrap();
            (order, proof)
        }
    }

    fn user(id: &str) -> UserSession {
        UserSession {
            user_id: id.into(),
            email: Some(format!("{id}@example.com")),
        }
    }

    #[tokio::test]
    async fn test_issue_records_server_priced_ticket() {
        let h = Harness::new();
        let issuer = h.issuer(Arc::new(QrCodec));
        let (order, proof) = h.paid("Solo", 2, &user("u1")).await;

        let issued = issuer.issue(&order, &proof, &user("u1")).await.unwrap();

        assert!(issued.newly_issued);
        assert_eq!(issued.ticket.amount, 1000);
        assert_eq!(issued.ticket.quantity, 2);
        assert_eq!(issued.ticket.status, "paid");
        assert!(!issued.ticket.checked_in);
        assert!(issued.qr_code.unwrap().starts_with("data:image/png;base64,"));

        let credential = CredentialPayload::parse(&issued.credential).unwrap();
        assert_eq!(credential.ticket_id, issued.ticket.id);
        assert!(credential.sig.is_some());
    }

    #[tokio::test]
    async fn test_replay_returns_the_same_ticket() {
        let h = Harness::new();
        let issuer = h.issuer(Arc::new(QrCodec));
        let (order, proof) = h.paid("Couple", 1, &user("u1")).await;

        let first = issuer.issue(&order, &proof, &user("u1")).await.unwrap();
        let second = issuer.issue(&order, &proof, &user("u1")).await.unwrap();

        assert_eq!(first.ticket.id, second.ticket.id);
        assert!(!second.newly_issued);
        assert_eq!(h.store.counts().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_concurrent_issue_yields_one_ticket() {
        let h = Harness::new();
        let issuer = Arc::new(h.issuer(Arc::new(BrokenCodec)));
        let (order, proof) = h.paid("Solo", 1, &user("u1")).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let issuer = issuer.clone();
                let order = order.clone();
                let proof = proof.clone();
                tokio::spawn(async move { issuer.issue(&order, &proof, &user("u1")).await })
            })
            .collect();

        let mut ids = Vec::new();
        let mut fresh = 0;
        for handle in handles {
            let issued = handle.await.unwrap().unwrap();
            ids.push(issued.ticket.id);
            fresh += usize::from(issued.newly_issued);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(fresh, 1);
        assert_eq!(h.store.counts().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_codec_failure_still_issues() {
        let h = Harness::new();
        let issuer = h.issuer(Arc::new(BrokenCodec));
        let (order, proof) = h.paid("Solo", 1, &user("u1")).await;

        let issued = issuer.issue(&order, &proof, &user("u1")).await.unwrap();
        assert!(issued.qr_code.is_none());
        assert!(!issued.credential.is_empty());
        assert!(h.store.get(issued.ticket.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_payment_cannot_be_redeemed_by_another_account() {
        let h = Harness::new();
        let issuer = h.issuer(Arc::new(BrokenCodec));
        let (order, proof) = h.paid("Solo", 1, &user("u1")).await;
        issuer.issue(&order, &proof, &user("u1")).await.unwrap();

        let err = issuer.issue(&order, &proof, &user("u2")).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_issue_rejects_order_that_does_not_match_payment() {
        let h = Harness::new();
        let issuer = h.issuer(Arc::new(BrokenCodec));
        let (_, proof) = h.paid("Solo", 1, &user("u1")).await;
        let bigger = h.orders.build_order("Couple", 3).unwrap();

        let err = issuer.issue(&bigger, &proof, &user("u1")).await.unwrap_err();
        assert_eq!(err.code(), "PAYMENT_REJECTED");
        assert_eq!(h.store.counts().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_rendering_stays_off_the_async_worker() {
        let h = Harness::new();
        let codec = Arc::new(ThreadRecordingCodec {
            rendered_on: std::sync::Mutex::new(None),
        });
        let issuer = h.issuer(codec.clone());
        let (order, proof) = h.paid("Solo", 1, &user("u1")).await;

        let issued = issuer.issue(&order, &proof, &user("u1")).await.unwrap();
        assert!(issued.qr_code.is_some());

        let rendered_on = codec.rendered_on.lock().unwrap().unwrap();
        assert_ne!(rendered_on, std::thread::current().id());
    }
}
