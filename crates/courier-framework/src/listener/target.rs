//! Target matching with a per-listener classification cache.

use std::collections::HashSet;

use courier_core::EventKey;
use parking_lot::RwLock;
use tracing::trace;

/// How a key is currently classified by a [`TargetMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClassification {
    /// Not queried yet.
    Unknown,
    /// Routed to the listener.
    Match,
    /// Not routed to the listener.
    NoMatch,
}

#[derive(Debug, Default)]
struct TargetCache {
    matched: HashSet<EventKey>,
    unmatched: HashSet<EventKey>,
}

/// Decides whether events of a given type are routed to a listener.
///
/// An empty target list listens to everything. Otherwise a key matches when
/// it is a sub key of any target. The outcome of the hierarchy walk is
/// cached per key and never changes afterwards; the cache is written only
/// under the matcher's lock, and a key is never in both sets.
#[derive(Debug)]
pub struct TargetMatcher {
    targets: Vec<EventKey>,
    explicit: HashSet<EventKey>,
    cache: RwLock<TargetCache>,
}

impl TargetMatcher {
    pub fn new(targets: Vec<EventKey>) -> Self {
        let explicit = targets.iter().cloned().collect();
        Self {
            targets,
            explicit,
            cache: RwLock::new(TargetCache::default()),
        }
    }

    /// Returns the declared targets.
    pub fn targets(&self) -> &[EventKey] {
        &self.targets
    }

    /// Returns `true` if the listener listens to every event type.
    pub fn listens_to_all(&self) -> bool {
        self.targets.is_empty()
    }

    /// Returns `true` if events of type `key` are routed to the listener.
    pub fn is_target(&self, key: &EventKey) -> bool {
        if self.targets.is_empty() {
            return true;
        }

        {
            let cache = self.cache.read();
            if cache.unmatched.contains(key) {
                return false;
            }
            if cache.matched.contains(key) {
                return true;
            }
        }
        if self.explicit.contains(key) {
            return true;
        }

        let mut cache = self.cache.write();
        if cache.matched.contains(key) {
            return true;
        }
        if cache.unmatched.contains(key) {
            return false;
        }

        let matched = self.targets.iter().any(|target| key.is_sub_of(target));
        trace!(key = %key, matched, "classified event key");
        if matched {
            cache.matched.insert(key.clone());
        } else {
            cache.unmatched.insert(key.clone());
        }
        matched
    }

    /// Returns the cached classification of `key`, without classifying it.
    pub fn classification(&self, key: &EventKey) -> TargetClassification {
        let cache = self.cache.read();
        match (cache.matched.contains(key), cache.unmatched.contains(key)) {
            (true, _) => TargetClassification::Match,
            (_, true) => TargetClassification::NoMatch,
            _ => TargetClassification::Unknown,
        }
    }
}
