use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Display;
use std::hash::Hash;

use anyhow::Result;
use tracing::warn;

/// Run-scoped memo for remote lookups. Each key is fetched at most once; a
/// failed fetch is remembered as an empty value.
#[derive(Debug)]
pub struct FetchCache<K, V> {
    label: &'static str,
    entries: HashMap<K, V>,
    fetches: usize,
    failures: usize,
}

impl<K, V> FetchCache<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Default,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: HashMap::new(),
            fetches: 0,
            failures: 0,
        }
    }

    pub fn get_or_fetch(&mut self, key: &K, fetch: impl FnOnce(&K) -> Result<V>) -> &V {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                self.fetches += 1;
                let value = match fetch(key) {
                    Ok(value) => value,
                    Err(err) => {
                        self.failures += 1;
                        warn!(cache = self.label, key = %key, error = %err, "fetch failed, using empty value");
                        V::default()
                    }
                };
                slot.insert(value)
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn values(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    pub fn failure_count(&self) -> usize {
        self.failures
    }
}
