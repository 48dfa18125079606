use std::sync::Arc;

use crate::models::GateStats;
use crate::services::pricing::PricingTable;
use crate::store::TicketStore;
use crate::utils::error::AppError;

/// Read-side counters over the ticket set. A snapshot taken under
/// concurrent writes may lag by a scan or two.
pub struct StatsAggregator {
    store: Arc<dyn TicketStore>,
    pricing: Arc<PricingTable>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn TicketStore>, pricing: Arc<PricingTable>) -> Self {
        Self { store, pricing }
    }

    pub async fn stats(&self) -> Result<GateStats, AppError> {
        let counts = self.store.counts().await?;

        let mut counts_by_tier = counts.by_tier;
        for tier in self.pricing.tiers() {
            counts_by_tier.entry(tier.name.clone()).or_insert(0);
        }

        Ok(GateStats {
            total_tickets: counts.total,
            checked_in_tickets: counts.checked_in,
            pending_tickets: (counts.total - counts.checked_in).max(0),
            counts_by_tier,
        })
    }
}
