use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{CreateOrderRequest, GatewayError, GatewayOrder, PaymentGateway};

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
struct Credentials {
    key_id: String,
    key_secret: String,
}

pub struct RazorpayGateway {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayGateway {
    /// Missing credentials are not an error here; order creation reports
    /// `NotConfigured` instead, so the rest of the service still starts.
    pub fn new(
        base_url: &str,
        key_id: Option<String>,
        key_secret: Option<String>,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let credentials = match (key_id, key_secret) {
            (Some(key_id), Some(key_secret)) => Some(Credentials { key_id, key_secret }),
            _ => {
                tracing::warn!("Razorpay credentials missing; checkout is disabled");
                None
            }
        };

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.base_url)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let credentials = self.credentials.as_ref().ok_or(GatewayError::NotConfigured)?;

        let response = self
            .http
            .post(self.orders_url())
            .basic_auth(&credentials.key_id, Some(&credentials.key_secret))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, description) = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => (
                    envelope.error.code.unwrap_or_else(|| "ORDER_ERROR".to_string()),
                    envelope
                        .error
                        .description
                        .unwrap_or_else(|| "Failed to create order".to_string()),
                ),
                Err(_) => ("ORDER_ERROR".to_string(), body),
            };
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                code,
                description,
            });
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        info!(
            gateway_order_id = %order.id,
            amount = order.amount,
            currency = %order.currency,
            "Gateway order created"
        );
        Ok(order)
    }

    fn client_key(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.key_id.as_str())
    }
}
