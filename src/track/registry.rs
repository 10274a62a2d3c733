use ahash::AHashMap;

use super::tracker::GarbageTracker;

/// Process-lifetime map from name to tracker. Built as an explicit object so
/// embedders and tests construct isolated registries instead of sharing a
/// process singleton; the same name always yields the same entry.
#[derive(Default)]
pub struct TrackerRegistry {
    trackers: AHashMap<String, GarbageTracker>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self {
            trackers: AHashMap::new(),
        }
    }

    /// Return the tracker with the specified name, creating it on first
    /// lookup. Repeated calls with one name hit the same instance, which is
    /// what lets reused call-site wrappers share counters.
    pub fn get_or_create(&mut self, name: &str) -> &mut GarbageTracker {
        self.trackers
            .entry(name.to_string())
            .or_insert_with_key(|key| GarbageTracker::new(key.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&GarbageTracker> {
        self.trackers.get(name)
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}
