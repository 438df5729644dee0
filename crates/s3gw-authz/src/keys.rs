//! Access key to principal mapping.

use std::collections::HashMap;

/// Immutable mapping from access-key id to principal name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStore {
    keys: HashMap<String, String>,
}

impl KeyStore {
    /// Create a store from an access-key to principal map.
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }

    /// Principal owning `access_key`.
    pub fn principal(&self, access_key: &str) -> Option<&str> {
        self.keys.get(access_key).map(String::as_str)
    }

    /// Number of known keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are known.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for KeyStore
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            keys: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let store: KeyStore = [("AKIAABC", "alice"), ("AKIAXYZ", "bob")].into_iter().collect();
        assert_eq!(store.principal("AKIAABC"), Some("alice"));
        assert_eq!(store.principal("missing"), None);
        assert_eq!(store.len(), 2);
        assert!(KeyStore::default().is_empty());
    }
}
