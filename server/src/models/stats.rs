use std::collections::BTreeMap;

use serde::Serialize;

/// Raw counters as read from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketCounts {
    pub total: i64,
    pub checked_in: i64,
    pub by_tier: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStats {
    pub total_tickets: i64,
    pub checked_in_tickets: i64,
    pub pending_tickets: i64,
    pub counts_by_tier: BTreeMap<String, i64>,
}
