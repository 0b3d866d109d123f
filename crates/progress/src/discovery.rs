use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, info};

use crate::events::{SubscriptionId, Subscribers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub identifier: String,
    pub first_time: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("discovery identifier must not be empty")]
    InvalidInput,
}

/// Identifiers (species names and the like) the player has encountered.
#[derive(Debug)]
pub struct DiscoverySet {
    discovered: BTreeSet<String>,
    subscribers: Subscribers<Discovered>,
}

impl Default for DiscoverySet {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoverySet {
    pub fn new() -> Self {
        Self {
            discovered: BTreeSet::new(),
            subscribers: Subscribers::new("discoveries"),
        }
    }

    /// Records `identifier` and reports whether this was its first discovery.
    ///
    /// Subscribers hear about repeat encounters too, flagged `first_time: false`.
    pub fn discover(&mut self, identifier: &str) -> Result<bool, DiscoveryError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(DiscoveryError::InvalidInput);
        }

        let first_time = self.discovered.insert(identifier.to_string());
        if first_time {
            info!(identifier, total = self.discovered.len(), "discovery_new");
        } else {
            debug!(identifier, "discovery_repeat");
        }

        self.subscribers.notify(&Discovered {
            identifier: identifier.to_string(),
            first_time,
        });
        Ok(first_time)
    }

    pub fn has_discovered(&self, identifier: &str) -> bool {
        self.discovered.contains(identifier.trim())
    }

    pub fn discovery_count(&self) -> usize {
        self.discovered.len()
    }

    pub fn all(&self) -> Vec<String> {
        self.discovered.iter().cloned().collect()
    }

    /// Replaces the whole set. Subscribers are not notified.
    pub fn load_all<I>(&mut self, identifiers: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.discovered = identifiers
            .into_iter()
            .map(|identifier| identifier.trim().to_string())
            .filter(|identifier| !identifier.is_empty())
            .collect();
        info!(total = self.discovered.len(), "discoveries_loaded");
    }

    pub fn reset_all(&mut self) {
        info!(total = self.discovered.len(), "discoveries_reset");
        self.discovered.clear();
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&Discovered) + 'static,
    {
        self.subscribers.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn first_discovery_is_reported_once() {
        let mut set = DiscoverySet::new();

        assert_eq!(set.discover("Kangaroo"), Ok(true));
        assert_eq!(set.discover("Emu"), Ok(true));
        assert_eq!(set.discover("Kangaroo"), Ok(false));
        for _ in 0..5 {
            assert_eq!(set.discover("Kangaroo"), Ok(false));
        }

        assert_eq!(set.discovery_count(), 2);
        assert!(set.has_discovered("Emu"));
        assert!(!set.has_discovered("Wombat"));
    }

    #[test]
    fn repeat_encounters_still_notify() {
        let mut set = DiscoverySet::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        set.subscribe(move |event| seen_clone.borrow_mut().push(event.first_time));

        set.discover("Kangaroo").expect("discover");
        set.discover("Kangaroo").expect("discover");

        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn padded_identifier_matches_trimmed_one() {
        let mut set = DiscoverySet::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        set.subscribe(move |event| seen_clone.borrow_mut().push(event.identifier.clone()));

        assert_eq!(set.discover(" Emu\t"), Ok(true));
        assert_eq!(set.discover("Emu"), Ok(false));

        assert!(set.has_discovered("Emu"));
        assert!(set.has_discovered("  Emu "));
        assert_eq!(set.all(), vec!["Emu".to_string()]);
        assert_eq!(*seen.borrow(), vec!["Emu".to_string(), "Emu".to_string()]);

        set.load_all(vec![" Wombat ".to_string(), "Wombat".to_string()]);
        assert_eq!(set.all(), vec!["Wombat".to_string()]);
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let mut set = DiscoverySet::new();
        assert_eq!(set.discover(""), Err(DiscoveryError::InvalidInput));
        assert_eq!(set.discover("   "), Err(DiscoveryError::InvalidInput));
        assert_eq!(set.discovery_count(), 0);
    }

    #[test]
    fn load_replaces_and_reset_clears() {
        let mut set = DiscoverySet::new();
        set.discover("Dingo").expect("discover");

        set.load_all(vec!["Emu".to_string(), "Emu".to_string(), "Koala".to_string()]);
        assert_eq!(set.all(), vec!["Emu".to_string(), "Koala".to_string()]);
        assert!(!set.has_discovered("Dingo"));

        set.reset_all();
        assert_eq!(set.discovery_count(), 0);
    }
}
