//! Topic management
//!
//! A `Topic` holds the published history of one topic name, oldest first.
//! The `TopicStore` keeps topics in creation order; that order is what
//! `resolve` scans and what `list_topics` reports.
//!
//! Topic matching is a plain prefix test on the name: pattern `"a"` matches
//! `"a"`, `"ab"` and `"a/b"` alike. There is no hierarchy delimiter.
//!
//! Retention: with a non-zero `max_history` the oldest values are evicted
//! once a topic's history grows past the limit. `0` keeps everything.

use std::collections::{HashMap, VecDeque};

use crate::broker::message::Value;

/// Whether `pattern` selects `topic`.
pub fn matches(pattern: &str, topic: &str) -> bool {
    topic.starts_with(pattern)
}

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub history: VecDeque<Value>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            history: VecDeque::new(),
        }
    }

    /// The most recently published value.
    pub fn latest(&self) -> Option<&Value> {
        self.history.back()
    }

    /// Append a value, evicting from the front past `max_history` (0 = unbounded).
    pub fn push(&mut self, value: Value, max_history: usize) {
        self.history.push_back(value);
        if max_history > 0 {
            while self.history.len() > max_history {
                self.history.pop_front();
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct TopicStore {
    topics: Vec<Topic>,
    index: HashMap<String, usize>,
    max_history: usize,
}

impl TopicStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            topics: Vec::new(),
            index: HashMap::new(),
            max_history,
        }
    }

    /// Append `value` to `topic`, creating the topic on first publish.
    pub fn put(&mut self, topic: &str, value: Value) {
        let slot = match self.index.get(topic) {
            Some(&slot) => slot,
            None => {
                self.topics.push(Topic::new(topic));
                let slot = self.topics.len() - 1;
                self.index.insert(topic.to_string(), slot);
                slot
            }
        };
        self.topics[slot].push(value, self.max_history);
    }

    /// Names of every topic holding at least one value, in creation order.
    pub fn list_topics(&self) -> Vec<String> {
        self.topics
            .iter()
            .filter(|t| !t.history.is_empty())
            .map(|t| t.name.clone())
            .collect()
    }

    /// Latest value of the first topic (in creation order) that `pattern` prefixes.
    ///
    /// Only the first matching topic is consulted; if its history is empty the
    /// result is `None` even when a later topic would match.
    pub fn resolve(&self, pattern: &str) -> Option<&Value> {
        self.topics
            .iter()
            .find(|t| matches(pattern, &t.name))
            .and_then(Topic::latest)
    }

    pub fn get(&self, topic: &str) -> Option<&Topic> {
        self.index.get(topic).map(|&slot| &self.topics[slot])
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
