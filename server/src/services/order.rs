use std::sync::Arc;

use crate::models::Order;
use crate::services::pricing::PricingTable;
use crate::utils::error::AppError;

#[derive(Debug, Clone)]
pub struct OrderBuilder {
    pricing: Arc<PricingTable>,
    max_quantity: u32,
    currency: String,
}

impl OrderBuilder {
    pub fn new(pricing: Arc<PricingTable>, max_quantity: u32, currency: impl Into<String>) -> Self {
        Self {
            pricing,
            max_quantity,
            currency: currency.into(),
        }
    }

    pub fn max_quantity(&self) -> u32 {
        self.max_quantity
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Prices `quantity` tickets of `tier`. The total is always computed here.
    pub fn build_order(&self, tier: &str, quantity: i64) -> Result<Order, AppError> {
        let invalid = || AppError::InvalidQuantity {
            quantity,
            max: self.max_quantity,
        };

        let count = u32::try_from(quantity).map_err(|_| invalid())?;
        if count < 1 || count > self.max_quantity {
            return Err(invalid());
        }

        let tier = self.pricing.tier(tier)?;
        let total_amount = tier
            .unit_price
            .checked_mul(i64::from(count))
            .ok_or_else(|| AppError::ValidationError("order total overflows".to_string()))?;

        Ok(Order::new(
            tier.name.clone(),
            count,
            tier.unit_price,
            total_amount,
            self.currency.clone(),
        ))
    }
}
