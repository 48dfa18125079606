use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use super::{CreateOrderRequest, GatewayError, GatewayOrder, PaymentGateway};

pub const MOCK_CLIENT_KEY: &str = "rzp_test_mock";

/// Gateway stand-in for development. Opens orders without any network call.
#[derive(Debug, Default)]
pub struct MockGateway {
    orders_created: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders_created(&self) -> usize {
        self.orders_created.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        self.orders_created.fetch_add(1, Ordering::Relaxed);
        let order = GatewayOrder {
            id: format!("order_mock_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
        };
        tracing::info!(
            gateway_order_id = %order.id,
            amount = order.amount,
            receipt = %request.receipt,
            "Mock gateway order created"
        );
        Ok(order)
    }

    fn client_key(&self) -> Option<&str> {
        Some(MOCK_CLIENT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[tokio::test]
    async fn test_echoes_amount_and_counts_orders() {
        let gateway = MockGateway::new();
        let request = CreateOrderRequest {
            amount: 90000,
            currency: "INR".into(),
            receipt: "rcpt_1".into(),
            notes: BTreeMap::new(),
        };

        let first = gateway.create_order(&request).await.unwrap();
        let second = gateway.create_order(&request).await.unwrap();

        assert_eq!(first.amount, 90000);
        assert_eq!(first.currency, "INR");
        assert_ne!(first.id, second.id);
        assert_eq!(gateway.orders_created(), 2);
        assert_eq!(gateway.client_key(), Some(MOCK_CLIENT_KEY));
    }
}
