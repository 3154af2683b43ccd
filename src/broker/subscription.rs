//! Subscription registry
//!
//! Each entry is keyed by (connection, format) and holds the patterns that
//! connection wants notifications for. Patterns are kept in insertion order and
//! adding one twice is a no-op.
//!
//! `subscribers_for` yields a key once per matching pattern, so a connection
//! whose patterns overlap receives one delivery per pattern.

use std::collections::HashMap;

use crate::broker::topic::matches;
use crate::client::ConnectionId;
use crate::codec::Format;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub connection: ConnectionId,
    pub format: Format,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Entries in the order their first pattern was added.
    entries: Vec<(SubscriptionKey, Vec<String>)>,
    index: HashMap<SubscriptionKey, usize>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `pattern` to the entry for (connection, format), creating it if needed.
    pub fn subscribe(&mut self, pattern: &str, connection: &ConnectionId, format: Format) {
        let key = SubscriptionKey {
            connection: connection.clone(),
            format,
        };
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.entries.push((key.clone(), Vec::new()));
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        let patterns = &mut self.entries[slot].1;
        if !patterns.iter().any(|p| p == pattern) {
            patterns.push(pattern.to_string());
        }
    }

    /// Remove `pattern` from every entry of `connection`, whatever its format.
    pub fn unsubscribe(&mut self, pattern: &str, connection: &ConnectionId) {
        for (key, patterns) in self.entries.iter_mut() {
            if &key.connection == connection {
                patterns.retain(|p| p != pattern);
            }
        }
    }

    /// One key per (entry, pattern) pair whose pattern prefixes `topic`, in
    /// subscription order.
    pub fn subscribers_for(&self, topic: &str) -> Vec<SubscriptionKey> {
        let mut keys = Vec::new();
        for (key, patterns) in &self.entries {
            for pattern in patterns {
                if matches(pattern, topic) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }

    /// Drop every entry belonging to `connection`.
    pub fn remove_connection(&mut self, connection: &ConnectionId) {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| &key.connection != connection);
        if self.entries.len() != before {
            self.index = self
                .entries
                .iter()
                .enumerate()
                .map(|(slot, (key, _))| (key.clone(), slot))
                .collect();
        }
    }

    pub fn patterns_of(&self, connection: &ConnectionId) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, _)| &key.connection == connection)
            .flat_map(|(_, patterns)| patterns.iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
