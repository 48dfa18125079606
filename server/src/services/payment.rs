use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::UserSession;
use crate::gateway::{CreateOrderRequest, PaymentGateway};
use crate::models::payment::RejectReason;
use crate::models::{Order, PaymentCallback, PaymentSession, VerifiedPayment, VerifyOutcome};
use crate::services::signing::HmacKey;
use crate::utils::error::AppError;

/// Label for deriving the checkout-token key from the gateway secret. Checkout
/// tokens must never verify as gateway callback signatures.
const CHECKOUT_KEY_LABEL: &str = "gatepass-checkout-key";

/// Opens gateway orders and decides whether a payment happened.
///
/// `verify_callback` is the only authority for "paid": it recomputes
/// `HMAC(secret, order_id|payment_id)` and compares in constant time. A
/// browser-side success callback by itself proves nothing.
///
/// Each session also gets a checkout token binding the gateway order to the
/// payer, tier, quantity and amount, so the order can be rebuilt at
/// issuance time without persisting anything before payment.
pub struct PaymentSessionManager {
    gateway: Arc<dyn PaymentGateway>,
    secret: Option<HmacKey>,
    checkout: Option<HmacKey>,
}

impl PaymentSessionManager {
    pub fn new(gateway: Arc<dyn PaymentGateway>, secret: Option<&str>) -> Self {
        Self {
            gateway,
            secret: secret.and_then(HmacKey::new),
            checkout: secret
                .and_then(HmacKey::new)
                .and_then(|key| HmacKey::new(&key.sign_hex(CHECKOUT_KEY_LABEL))),
        }
    }

    pub async fn create_session(
        &self,
        order: &Order,
        payer: &UserSession,
    ) -> Result<PaymentSession, AppError> {
        let unconfigured =
            || AppError::GatewayUnavailable("Payment gateway is not configured".to_string());
        let checkout = self.checkout.as_ref().ok_or_else(unconfigured)?;
        let client_key = self.gateway.client_key().ok_or_else(unconfigured)?;

        let request = CreateOrderRequest {
            amount: order.total_amount(),
            currency: order.currency().to_string(),
            receipt: receipt_id(),
            notes: BTreeMap::from([
                ("tier".to_string(), order.tier().to_string()),
                ("quantity".to_string(), order.quantity().to_string()),
                ("owner".to_string(), payer.user_id.clone()),
            ]),
        };
        let gateway_order = self.gateway.create_order(&request).await?;

        if gateway_order.amount != order.total_amount()
            || !gateway_order.currency.eq_ignore_ascii_case(order.currency())
        {
            tracing::error!(
                gateway_order_id = %gateway_order.id,
                requested = order.total_amount(),
                returned = gateway_order.amount,
                "Gateway order does not match the requested amount"
            );
            return Err(AppError::GatewayUnavailable(
                "Payment gateway returned an inconsistent order".to_string(),
            ));
        }

        let checkout_token = checkout.sign_hex(&checkout_message(&gateway_order.id, order, payer));

        info!(
            gateway_order_id = %gateway_order.id,
            user_id = %payer.user_id,
            tier = %order.tier(),
            quantity = order.quantity(),
            amount = order.total_amount(),
            "Payment session created"
        );

        Ok(PaymentSession::created(
            gateway_order.id,
            order.total_amount(),
            order.currency().to_string(),
            client_key.to_string(),
            checkout_token,
        ))
    }

    /// Pure check of a gateway callback. No side effects beyond logging.
    pub fn verify_callback(&self, callback: &PaymentCallback) -> VerifyOutcome {
        let outcome = self.check_signature(callback);
        if let VerifyOutcome::Rejected(reason) = &outcome {
            warn!(
                gateway_order_id = callback.gateway_order_id.as_deref().unwrap_or("-"),
                reason = %reason,
                "Payment callback rejected"
            );
        }
        outcome
    }

    /// Verifies the callback and the checkout binding for `order`. The
    /// returned proof is the only way to get a ticket issued.
    pub fn confirm(
        &self,
        order: &Order,
        callback: &PaymentCallback,
        checkout_token: &str,
        payer: &UserSession,
    ) -> Result<VerifiedPayment, AppError> {
        let gateway_order_id = present(&callback.gateway_order_id).ok_or_else(|| {
            AppError::PaymentRejected(RejectReason::MissingField("gatewayOrderId").to_string())
        })?;

        let mut session = PaymentSession::created(
            gateway_order_id.to_string(),
            order.total_amount(),
            order.currency().to_string(),
            self.gateway.client_key().unwrap_or_default().to_string(),
            checkout_token.to_string(),
        );

        let outcome = match self.verify_callback(callback) {
            VerifyOutcome::Verified if !self.checkout_matches(&session, order, payer) => {
                warn!(
                    gateway_order_id = %gateway_order_id,
                    user_id = %payer.user_id,
                    "Checkout token does not match the submitted order"
                );
                VerifyOutcome::Rejected(RejectReason::CheckoutMismatch)
            }
            other => other,
        };

        match outcome {
            VerifyOutcome::Verified => {
                let payment_id = present(&callback.gateway_payment_id).unwrap_or_default();
                session.mark_verified(payment_id)?;
                info!(
                    gateway_order_id = %gateway_order_id,
                    gateway_payment_id = %payment_id,
                    amount = order.total_amount(),
                    "Payment verified"
                );
                VerifiedPayment::from_session(session).ok_or_else(|| {
                    AppError::InternalServerError("verified session without payment id".into())
                })
            }
            VerifyOutcome::Rejected(reason) => {
                session.mark_failed()?;
                Err(AppError::PaymentRejected(reason.to_string()))
            }
        }
    }

    /// Signature the gateway would attach to this order/payment pair. Used by
    /// the mock checkout flow.
    pub fn sign_callback(&self, gateway_order_id: &str, gateway_payment_id: &str) -> Option<String> {
        self.secret
            .as_ref()
            .map(|key| key.sign_hex(&callback_message(gateway_order_id, gateway_payment_id)))
    }

    fn check_signature(&self, callback: &PaymentCallback) -> VerifyOutcome {
        let Some(order_id) = present(&callback.gateway_order_id) else {
            return VerifyOutcome::Rejected(RejectReason::MissingField("gatewayOrderId"));
        };
        let Some(payment_id) = present(&callback.gateway_payment_id) else {
            return VerifyOutcome::Rejected(RejectReason::MissingField("gatewayPaymentId"));
        };
        let Some(signature) = present(&callback.signature) else {
            return VerifyOutcome::Rejected(RejectReason::MissingField("signature"));
        };
        let Some(secret) = self.secret.as_ref() else {
            return VerifyOutcome::Rejected(RejectReason::SecretUnavailable);
        };

        if secret.verify_hex(&callback_message(order_id, payment_id), signature) {
            VerifyOutcome::Verified
        } else {
            VerifyOutcome::Rejected(RejectReason::SignatureMismatch)
        }
    }

    fn checkout_matches(&self, session: &PaymentSession, order: &Order, payer: &UserSession) -> bool {
        self.checkout.as_ref().is_some_and(|key| {
            key.verify_hex(
                &checkout_message(session.gateway_order_id(), order, payer),
                session.checkout_token(),
            )
        })
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn callback_message(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

fn checkout_message(gateway_order_id: &str, order: &Order, payer: &UserSession) -> String {
    format!(
        "checkout|{}|{}|{}|{}|{}|{}",
        gateway_order_id,
        payer.user_id,
        order.tier(),
        order.quantity(),
        order.total_amount(),
        order.currency()
    )
}

/// Gateway receipts are capped at 40 characters.
fn receipt_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("rcpt_{}", &id[..20])
}
