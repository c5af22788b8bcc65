use {
    crate::request::SimulationResult,
    std::{
        collections::{HashMap, VecDeque},
        time::{Duration, Instant},
    },
};

/// Hard cap on stored entries.
const MAX_ENTRIES: usize = 500;
/// Occupancy (fraction of the cap) at which eviction kicks in.
const EVICTION_THRESHOLD: f64 = 0.8;
/// Eviction drives the size this far below the cap so it does not re-trigger
/// on every insert.
const EVICTION_HEADROOM: usize = 50;

struct Entry {
    result: SimulationResult,
    expires_at: Instant,
}

/// Deduplicating cache of successful simulation results.
///
/// Only successful results get stored. Expired entries are never returned.
/// Eviction removes expired entries first and then the oldest by insertion
/// order.
pub(crate) struct SimulationCache {
    entries: HashMap<String, Entry>,
    insertion_order: VecDeque<String>,
    ttl: Duration,
}

impl SimulationCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            ttl,
        }
    }

    pub(crate) fn get(&mut self, key: &str, now: Instant) -> Option<SimulationResult> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= now {
            self.entries.remove(key);
            self.insertion_order.retain(|stored| stored != key);
            return None;
        }
        Some(entry.result.clone())
    }

    pub(crate) fn insert(&mut self, key: String, result: SimulationResult, now: Instant) {
        debug_assert!(result.success, "only successful results are cacheable");
        if !result.success {
            return;
        }
        self.evict_if_needed(now);
        if self
            .entries
            .insert(
                key.clone(),
                Entry {
                    result,
                    expires_at: now + self.ttl,
                },
            )
            .is_some()
        {
            self.insertion_order.retain(|stored| *stored != key);
        }
        self.insertion_order.push_back(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_if_needed(&mut self, now: Instant) {
        let threshold = (MAX_ENTRIES as f64 * EVICTION_THRESHOLD) as usize;
        if self.entries.len() < threshold {
            return;
        }
        let size_before = self.entries.len();

        // First pass: drop everything already expired.
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.insertion_order
            .retain(|key| self.entries.contains_key(key));

        // Second pass: oldest first until comfortably below the cap.
        if self.entries.len() >= MAX_ENTRIES {
            let target = MAX_ENTRIES - EVICTION_HEADROOM;
            while self.entries.len() > target {
                let Some(oldest) = self.insertion_order.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
            }
        }

        let evicted = size_before - self.entries.len();
        if size_before >= MAX_ENTRIES {
            debug_assert!(evicted >= size_before - MAX_ENTRIES + EVICTION_HEADROOM);
        }
        if evicted > 0 {
            tracing::debug!(evicted, size = self.entries.len(), "evicted cache entries");
        }
    }
}
