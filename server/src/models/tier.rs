use serde::{Deserialize, Serialize};

/// A purchasable ticket tier. Prices are in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketTier {
    pub name: String,
    pub unit_price: i64,
}

impl TicketTier {
    pub fn new(name: impl Into<String>, unit_price: i64) -> Self {
        Self {
            name: name.into(),
            unit_price,
        }
    }
}
