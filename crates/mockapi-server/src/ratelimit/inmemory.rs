use super::CounterStore;
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Sweep expired keys once the map grows past this many entries.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: i64,
    deadline: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory counter store for single-instance deployments and tests.
///
/// Expired counters read as absent, matching Redis key expiry.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, `None` when absent or expired.
    pub fn get(&self, key: &str) -> Option<i64> {
        let counters = self.counters.lock();
        counters
            .get(key)
            .filter(|counter| !counter.is_expired(Instant::now()))
            .map(|counter| counter.value)
    }

    pub fn len(&self) -> usize {
        self.counters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CounterStore for InMemoryCounterStore {
    fn incr(&self, key: &str) -> Result<i64> {
        let now = Instant::now();
        let mut counters = self.counters.lock();

        if counters.len() >= SWEEP_THRESHOLD && !counters.contains_key(key) {
            counters.retain(|_, counter| !counter.is_expired(now));
        }

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            deadline: None,
        });
        if counter.is_expired(now) {
            *counter = Counter {
                value: 0,
                deadline: None,
            };
        }
        counter.value += 1;
        Ok(counter.value)
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<()> {
        let mut counters = self.counters.lock();
        if seconds == 0 {
            counters.remove(key);
        } else if let Some(counter) = counters.get_mut(key) {
            counter.deadline = Some(Instant::now() + Duration::from_secs(seconds));
        }
        Ok(())
    }
}
