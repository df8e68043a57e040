use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::store::TemplateReference;

struct Entry {
    body: String,
    inserted_at: Instant,
}

/// Bounded, TTL-evicting cache of loaded template bodies, keyed by the
/// reference (which already embeds the version). Templates rarely change
/// mid-session, so a short TTL with a hard capacity bound is enough to
/// keep a busy renderer off the prompt store without risking staleness.
pub struct TemplateCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<TemplateReference, Entry>>,
}

impl TemplateCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { ttl, capacity, entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, reference: &TemplateReference) -> Option<String> {
        let mut entries = self.entries.lock().expect("template cache mutex poisoned");
        match entries.get(reference) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(reference);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, reference: TemplateReference, body: String) {
        let mut entries = self.entries.lock().expect("template cache mutex poisoned");
        if entries.len() >= self.capacity && !entries.contains_key(&reference) {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest_key);
            }
        }
        entries.insert(reference, Entry { body, inserted_at: Instant::now() });
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), 512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn caches_and_returns_hit() {
        let cache = TemplateCache::new(Duration::from_secs(60), 10);
        let reference = TemplateReference::new("sys/core_values", 1);
        cache.put(reference.clone(), "Hello {{name}}".to_string());
        assert_eq!(cache.get(&reference), Some("Hello {{name}}".to_string()));
    }

    #[test]
    fn expires_after_ttl() {
        let cache = TemplateCache::new(Duration::from_millis(10), 10);
        let reference = TemplateReference::new("sys/core_values", 1);
        cache.put(reference.clone(), "Hello".to_string());
        sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&reference), None);
    }

    #[test]
    fn evicts_oldest_when_over_capacity() {
        let cache = TemplateCache::new(Duration::from_secs(60), 2);
        let a = TemplateReference::new("a", 1);
        let b = TemplateReference::new("b", 1);
        let c = TemplateReference::new("c", 1);
        cache.put(a.clone(), "a".to_string());
        sleep(Duration::from_millis(5));
        cache.put(b.clone(), "b".to_string());
        sleep(Duration::from_millis(5));
        cache.put(c.clone(), "c".to_string());

        assert_eq!(cache.get(&a), None);
        assert_eq!(cache.get(&b), Some("b".to_string()));
        assert_eq!(cache.get(&c), Some("c".to_string()));
    }
}
