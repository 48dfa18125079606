//! Hosted payment gateway.
//!
//! The core only ever asks the gateway to open an order for an amount. The
//! money moves inside the gateway's own checkout widget, and the result comes
//! back as a signed callback that `services::payment` verifies locally.

mod mock;
mod razorpay;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::error::AppError;

pub use mock::MockGateway;
pub use razorpay::RazorpayGateway;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway credentials are not configured")]
    NotConfigured,

    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected the order ({status}): {code}: {description}")]
    Rejected {
        status: u16,
        code: String,
        description: String,
    },

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured => AppError::GatewayUnavailable(
                "Payment gateway is not configured".to_string(),
            ),
            other => {
                tracing::error!(error = %other, "Payment gateway call failed");
                AppError::GatewayUnavailable("Payment gateway is unavailable".to_string())
            }
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError>;

    /// Publishable key for the browser checkout widget. Never the secret.
    fn client_key(&self) -> Option<&str>;
}
