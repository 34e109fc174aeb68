use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use regex::Regex;

use crate::types::Record;

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<Record>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

impl CacheState {
    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// Which keys an invalidation removes.
#[derive(Debug, Clone)]
pub enum CachePattern {
    Prefix(String),
    Regex(Regex),
}

impl CachePattern {
    /// Pattern covering every cached query of one table.
    pub fn table(table: &str) -> Self {
        CachePattern::Prefix(format!("{}:", table))
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            CachePattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            CachePattern::Regex(re) => re.is_match(key),
        }
    }
}

/// Bounded TTL cache of query results keyed by `table:serializedFilters`.
///
/// Entries are derived data. Reads hand out copies, and a full cache evicts
/// the oldest inserted entry regardless of how recently it was read.
#[derive(Debug)]
pub struct QueryCache {
    state: Mutex<CacheState>,
    capacity: usize,
    default_ttl: Duration,
}

impl QueryCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Cache state is always left consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Vec<Record>> {
        let mut state = self.lock();
        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => {
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.remove(key);
        }
        None
    }

    pub fn set(&self, key: &str, data: &[Record], ttl: Option<Duration>) {
        let mut state = self.lock();
        state.remove(key);
        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    log::debug!("Cache full, evicting {}", oldest);
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                data: data.to_vec(),
                inserted_at: Instant::now(),
                ttl: ttl.unwrap_or(self.default_ttl),
            },
        );
        state.order.push_back(key.to_string());
    }

    /// Remove every key matching the pattern. Returns how many were removed.
    pub fn invalidate(&self, pattern: &CachePattern) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !pattern.matches(key));
        let CacheState { entries, order } = &mut *state;
        order.retain(|key| entries.contains_key(key));
        before - state.entries.len()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Drop entries past their TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let CacheState { entries, order } = &mut *state;
        order.retain(|key| entries.contains_key(key));
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(name: &str) -> Vec<Record> {
        vec![json!({"id": "1", "name": name}).as_object().cloned().unwrap()]
    }

    #[test]
    fn test_get_returns_independent_copy() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        cache.set("menu_items:{}", &rows("Tea"), None);

        let mut first = cache.get("menu_items:{}").unwrap();
        first[0].insert("name".into(), json!("Mutated"));

        let second = cache.get("menu_items:{}").unwrap();
        assert_eq!(second[0]["name"], json!("Tea"));
    }

    #[test]
    fn test_evicts_oldest_inserted_not_least_recently_used() {
        let cache = QueryCache::new(2, Duration::from_secs(60));
        cache.set("a:1", &rows("a"), None);
        cache.set("b:1", &rows("b"), None);
        // Reading "a" does not protect it from eviction.
        assert!(cache.get("a:1").is_some());
        cache.set("c:1", &rows("c"), None);

        assert!(cache.get("a:1").is_none());
        assert!(cache.get("b:1").is_some());
        assert!(cache.get("c:1").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_expired_entries_are_not_served_and_are_swept() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        cache.set("a:1", &rows("a"), Some(Duration::ZERO));
        cache.set("b:1", &rows("b"), Some(Duration::ZERO));
        cache.set("c:1", &rows("c"), None);

        assert!(cache.get("a:1").is_none());
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_by_table_prefix_and_regex() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        cache.set("bookings:{}", &rows("x"), None);
        cache.set("bookings:{\"status\":\"pending\"}", &rows("x"), None);
        cache.set("bookings_archive:{}", &rows("x"), None);
        cache.set("staff:{}", &rows("x"), None);

        assert_eq!(cache.invalidate(&CachePattern::table("bookings")), 2);
        assert!(cache.get("bookings_archive:{}").is_some());

        let pattern = CachePattern::Regex(Regex::new("^staff:").unwrap());
        assert_eq!(cache.invalidate(&pattern), 1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
