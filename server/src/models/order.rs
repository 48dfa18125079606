use serde::Serialize;

/// A priced checkout attempt.
///
/// Only `OrderBuilder` constructs these, so `total_amount` is always the
/// server's own `unit_price * quantity` and never a client-supplied figure.
/// Not `Deserialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    tier: String,
    quantity: u32,
    unit_price: i64,
    total_amount: i64,
    currency: String,
}

impl Order {
    pub(crate) fn new(
        tier: String,
        quantity: u32,
        unit_price: i64,
        total_amount: i64,
        currency: String,
    ) -> Self {
        Self {
            tier,
            quantity,
            unit_price,
            total_amount,
            currency,
        }
    }

    pub fn tier(&self) -> &str {
        &self.tier
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> i64 {
        self.unit_price
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}
