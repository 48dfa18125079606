use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Verified,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Verified | PaymentStatus::Failed)
    }
}

/// One checkout attempt at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    gateway_order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway_payment_id: Option<String>,
    amount: i64,
    currency: String,
    status: PaymentStatus,
    client_key: String,
    checkout_token: String,
}

impl PaymentSession {
    pub(crate) fn created(
        gateway_order_id: String,
        amount: i64,
        currency: String,
        client_key: String,
        checkout_token: String,
    ) -> Self {
        Self {
            gateway_order_id,
            gateway_payment_id: None,
            amount,
            currency,
            status: PaymentStatus::Created,
            client_key,
            checkout_token,
        }
    }

    pub fn gateway_order_id(&self) -> &str {
        &self.gateway_order_id
    }

    pub fn gateway_payment_id(&self) -> Option<&str> {
        self.gateway_payment_id.as_deref()
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    pub fn checkout_token(&self) -> &str {
        &self.checkout_token
    }

    pub(crate) fn mark_verified(&mut self, gateway_payment_id: &str) -> Result<(), AppError> {
        self.ensure_open()?;
        self.status = PaymentStatus::Verified;
        self.gateway_payment_id = Some(gateway_payment_id.to_string());
        Ok(())
    }

    pub(crate) fn mark_failed(&mut self) -> Result<(), AppError> {
        self.ensure_open()?;
        self.status = PaymentStatus::Failed;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::InternalServerError(format!(
                "payment session {} already finalized as {:?}",
                self.gateway_order_id, self.status
            )));
        }
        Ok(())
    }
}

/// Proof that a gateway callback passed signature verification.
///
/// Constructed only by the payment session manager; ticket issuance takes
/// one of these, so no ticket can be written for an unverified payment.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    session: PaymentSession,
    gateway_payment_id: String,
}

impl VerifiedPayment {
    pub(crate) fn from_session(session: PaymentSession) -> Option<Self> {
        if session.status != PaymentStatus::Verified {
            return None;
        }
        let gateway_payment_id = session.gateway_payment_id.clone()?;
        Some(Self {
            session,
            gateway_payment_id,
        })
    }

    pub fn session(&self) -> &PaymentSession {
        &self.session
    }

    pub fn gateway_order_id(&self) -> &str {
        self.session.gateway_order_id()
    }

    pub fn gateway_payment_id(&self) -> &str {
        &self.gateway_payment_id
    }

    pub fn amount(&self) -> i64 {
        self.session.amount()
    }

    pub fn currency(&self) -> &str {
        self.session.currency()
    }
}

/// Fields the gateway hands back to the browser after checkout.
///
/// Accepts the gateway's own snake_case names as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    #[serde(default, alias = "razorpay_order_id")]
    pub gateway_order_id: Option<String>,
    #[serde(default, alias = "razorpay_payment_id")]
    pub gateway_payment_id: Option<String>,
    #[serde(default, alias = "razorpay_signature")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingField(&'static str),
    SecretUnavailable,
    SignatureMismatch,
    CheckoutMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingField(field) => write!(f, "missing field {field}"),
            RejectReason::SecretUnavailable => write!(f, "no verification secret configured"),
            RejectReason::SignatureMismatch => write!(f, "signature mismatch"),
            RejectReason::CheckoutMismatch => write!(f, "checkout token does not match order"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Rejected(RejectReason),
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PaymentSession {
        PaymentSession::created(
            "order_1".into(),
            1000,
            "INR".into(),
            "rzp_key".into(),
            "token".into(),
        )
    }

    #[test]
    fn test_verified_is_terminal() {
        let mut s = session();
        s.mark_verified("pay_1").unwrap();
        assert_eq!(s.status(), PaymentStatus::Verified);
        assert!(s.mark_failed().is_err());
        assert!(s.mark_verified("pay_2").is_err());
        assert_eq!(s.gateway_payment_id(), Some("pay_1"));
    }

    #[test]
    fn test_failed_session_is_never_resurrected() {
        let mut s = session();
        s.mark_failed().unwrap();
        assert!(s.mark_verified("pay_1").is_err());
        assert!(VerifiedPayment::from_session(s).is_none());
    }

    #[test]
    fn test_verified_payment_requires_verified_session() {
        assert!(VerifiedPayment::from_session(session()).is_none());

        let mut s = session();
        s.mark_verified("pay_9").unwrap();
        let proof = VerifiedPayment::from_session(s).unwrap();
        assert_eq!(proof.gateway_payment_id(), "pay_9");
        assert_eq!(proof.amount(), 1000);
    }

    #[test]
    fn test_callback_accepts_gateway_field_names() {
        let cb: PaymentCallback = serde_json::from_str(
            r#"{"razorpay_order_id":"o","razorpay_payment_id":"p","razorpay_signature":"s"}"#,
        )
        .unwrap();
        assert_eq!(cb.gateway_order_id.as_deref(), Some("o"));
        assert_eq!(cb.gateway_payment_id.as_deref(), Some("p"));
        assert_eq!(cb.signature.as_deref(), Some("s"));
    }
}
