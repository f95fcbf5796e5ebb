use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::Interval;

/// Identity of one upstream indicator request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorKey {
    pub symbol: String,
    pub venue: String,
    pub screener: String,
    pub interval: Interval,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: f64,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<IndicatorKey, Entry>,
    order: VecDeque<IndicatorKey>,
}

impl CacheState {
    fn remove(&mut self, key: &IndicatorKey) {
        if self.entries.remove(key).is_some() {
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                self.order.remove(pos);
            }
        }
    }
}

/// Bounded memo of recent indicator values.
///
/// Entries are served while younger than the TTL and the oldest insertion is
/// evicted once the capacity is exceeded. Safe to share across fetch tasks.
/// Ages follow the tokio clock, so a paused test runtime controls expiry.
#[derive(Debug)]
pub struct FetchCache {
    capacity: usize,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl FetchCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &IndicatorKey) -> Option<f64> {
        self.get_at(key, Instant::now())
    }

    pub fn put(&self, key: IndicatorKey, value: f64) {
        self.put_at(key, value, Instant::now());
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_at(&self, key: &IndicatorKey, now: Instant) -> Option<f64> {
        let mut state = self.lock();
        let entry = *state.entries.get(key)?;
        if now.saturating_duration_since(entry.inserted_at) < self.ttl {
            Some(entry.value)
        } else {
            state.remove(key);
            None
        }
    }

    pub(crate) fn put_at(&self, key: IndicatorKey, value: f64, now: Instant) {
        let mut state = self.lock();
        state.remove(&key);

        // Insertion order is also age order, so expired entries sit at the front.
        while let Some(front) = state.order.front().cloned() {
            let expired = state
                .entries
                .get(&front)
                .map(|entry| now.saturating_duration_since(entry.inserted_at) >= self.ttl)
                .unwrap_or(true);
            if !expired {
                break;
            }
            state.order.pop_front();
            state.entries.remove(&front);
        }

        state.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: now,
            },
        );
        state.order.push_back(key);

        while state.entries.len() > self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(symbol: &str) -> IndicatorKey {
        IndicatorKey {
            symbol: symbol.to_string(),
            venue: "BYBIT".to_string(),
            screener: "crypto".to_string(),
            interval: Interval::FifteenMinutes,
        }
    }

    #[test]
    fn expires_strictly_after_ttl() {
        let ttl = Duration::from_secs(300);
        let cache = FetchCache::new(10, ttl);
        let t0 = Instant::now();
        let eps = Duration::from_millis(1);

        cache.put_at(key("BTC"), 55.0, t0);

        assert_eq!(cache.get_at(&key("BTC"), t0 + ttl - eps), Some(55.0));
        assert_eq!(cache.get_at(&key("BTC"), t0 + ttl + eps), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_oldest_insertion_beyond_capacity() {
        let cache = FetchCache::new(2, Duration::from_secs(60));
        let t0 = Instant::now();

        cache.put_at(key("A"), 1.0, t0);
        cache.put_at(key("B"), 2.0, t0 + Duration::from_secs(1));
        cache.put_at(key("C"), 3.0, t0 + Duration::from_secs(2));

        let now = t0 + Duration::from_secs(3);
        assert_eq!(cache.get_at(&key("A"), now), None);
        assert_eq!(cache.get_at(&key("B"), now), Some(2.0));
        assert_eq!(cache.get_at(&key("C"), now), Some(3.0));
    }

    #[test]
    fn reinsert_refreshes_position_and_age() {
        let ttl = Duration::from_secs(60);
        let cache = FetchCache::new(2, ttl);
        let t0 = Instant::now();

        cache.put_at(key("A"), 1.0, t0);
        cache.put_at(key("B"), 2.0, t0 + Duration::from_secs(1));
        cache.put_at(key("A"), 1.5, t0 + Duration::from_secs(2));
        cache.put_at(key("C"), 3.0, t0 + Duration::from_secs(3));

        let now = t0 + Duration::from_secs(61);
        assert_eq!(cache.get_at(&key("A"), now), Some(1.5));
        assert_eq!(cache.get_at(&key("B"), now), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn keys_differ_by_interval() {
        let cache = FetchCache::new(4, Duration::from_secs(60));
        let mut hourly = key("BTC");
        hourly.interval = Interval::OneHour;

        cache.put(key("BTC"), 40.0);
        assert_eq!(cache.get(&hourly), None);
        assert_eq!(cache.get(&key("BTC")), Some(40.0));
    }
}
