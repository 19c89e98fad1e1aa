use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("key already registered")]
pub struct KeyInUse;

/// Callsign-keyed map of live addresses.
pub struct Registry<A> {
    inner: RwLock<HashMap<String, Arc<A>>>,
}

impl<A> Default for Registry<A> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<A> Registry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores under `key`, refusing to displace an existing entry.
    pub fn store(&self, key: &str, value: Arc<A>) -> Result<(), KeyInUse> {
        let mut inner = self.inner.write();
        if inner.contains_key(key) {
            return Err(KeyInUse);
        }
        inner.insert(key.to_owned(), value);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Option<Arc<A>> {
        self.inner.write().remove(key)
    }

    pub fn load(&self, key: &str) -> Option<Arc<A>> {
        self.inner.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Clones the current membership out from under the lock so delivery
    /// never blocks registration.
    pub fn snapshot(&self) -> Vec<Arc<A>> {
        self.inner.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_is_exclusive() {
        let registry: Registry<String> = Registry::new();
        registry.store("N123", Arc::new("a".into())).unwrap();
        assert_eq!(
            registry.store("N123", Arc::new("b".into())),
            Err(KeyInUse)
        );
        assert_eq!(registry.load("N123").unwrap().as_str(), "a");
        assert_eq!(registry.len(), 1);
        registry.delete("N123").unwrap();
        assert!(registry.load("N123").is_none());
        assert!(registry.is_empty());
    }
}
