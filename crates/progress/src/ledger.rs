use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::events::{SubscriptionId, Subscribers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneVisited {
    pub zone_id: String,
    pub count: u32,
}

/// Per-zone visit counts for the current session.
///
/// Counts only grow, except through [`ZoneVisitLedger::reset_all_visits`] or a
/// wholesale [`ZoneVisitLedger::load_visit_data`].
#[derive(Debug)]
pub struct ZoneVisitLedger {
    visits: HashMap<String, u32>,
    subscribers: Subscribers<ZoneVisited>,
}

impl Default for ZoneVisitLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneVisitLedger {
    pub fn new() -> Self {
        Self {
            visits: HashMap::new(),
            subscribers: Subscribers::new("zone_visits"),
        }
    }

    /// Increments the count for `zone_id` and notifies subscribers with the new count.
    ///
    /// An empty identifier is accepted as its own zone.
    pub fn record_visit(&mut self, zone_id: &str) -> u32 {
        if zone_id.is_empty() {
            warn!("zone_visit_with_empty_id");
        }
        let count = {
            let entry = self.visits.entry(zone_id.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };
        debug!(zone_id, count, "zone_visit_recorded");

        let event = ZoneVisited {
            zone_id: zone_id.to_string(),
            count,
        };
        self.subscribers.notify(&event);
        count
    }

    pub fn visit_count(&self, zone_id: &str) -> u32 {
        self.visits.get(zone_id).copied().unwrap_or(0)
    }

    pub fn all_visit_data(&self) -> HashMap<String, u32> {
        self.visits.clone()
    }

    pub fn zone_count(&self) -> usize {
        self.visits.len()
    }

    /// Replaces the whole table. Subscribers are not notified.
    pub fn load_visit_data(&mut self, data: HashMap<String, u32>) {
        info!(zones = data.len(), "zone_visits_loaded");
        self.visits = data;
    }

    pub fn reset_all_visits(&mut self) {
        info!(zones = self.visits.len(), "zone_visits_reset");
        self.visits.clear();
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&ZoneVisited) + 'static,
    {
        self.subscribers.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
