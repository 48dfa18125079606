use std::collections::HashSet;

use crate::config::ConfigError;
use crate::models::TicketTier;
use crate::utils::error::AppError;

/// Tier name to unit price. Lookups ignore case and surrounding whitespace.
#[derive(Debug, Clone)]
pub struct PricingTable {
    tiers: Vec<TicketTier>,
}

impl PricingTable {
    pub fn new(tiers: Vec<TicketTier>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for tier in &tiers {
            let invalid = |reason: String| ConfigError::Invalid {
                key: "TICKET_TIERS",
                reason,
            };
            if tier.name.trim().is_empty() {
                return Err(invalid("empty tier name".to_string()));
            }
            if tier.unit_price <= 0 {
                return Err(invalid(format!("price for '{}' must be positive", tier.name)));
            }
            if !seen.insert(tier.name.trim().to_lowercase()) {
                return Err(invalid(format!("tier '{}' is defined twice", tier.name)));
            }
        }
        if tiers.is_empty() {
            return Err(ConfigError::Invalid {
                key: "TICKET_TIERS",
                reason: "no tiers configured".to_string(),
            });
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[TicketTier] {
        &self.tiers
    }

    pub fn tier(&self, name: &str) -> Result<&TicketTier, AppError> {
        let wanted = name.trim();
        self.tiers
            .iter()
            .find(|t| t.name.trim().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::UnknownTier(wanted.to_string()))
    }

    pub fn price_of(&self, name: &str) -> Result<i64, AppError> {
        self.tier(name).map(|t| t.unit_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PricingTable {
        PricingTable::new(vec![
            TicketTier::new("Solo", 500),
            TicketTier::new("Couple", 900),
            TicketTier::new("Group", 1800),
        ])
        .unwrap()
    }

    #[test]
    fn test_price_of_known_tiers() {
        let table = table();
        assert_eq!(table.price_of("Solo").unwrap(), 500);
        assert_eq!(table.price_of(" couple ").unwrap(), 900);
        assert_eq!(table.tier("GROUP").unwrap().name, "Group");
    }

    #[test]
    fn test_unknown_tier() {
        let err = table().price_of("VIP").unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_TIER");
        assert!(table().price_of("").is_err());
    }

    #[test]
    fn test_rejects_invalid_tables() {
        assert!(PricingTable::new(vec![]).is_err());
        assert!(PricingTable::new(vec![TicketTier::new("Boy", 0)]).is_err());
        assert!(PricingTable::new(vec![
            TicketTier::new("Girl", 150),
            TicketTier::new("girl", 150)
        ])
        .is_err());
    }
}
