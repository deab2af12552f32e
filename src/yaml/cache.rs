//! Parsed-file cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use super::loader::FileKind;
use super::value::Value;

/// A thread-safe cache of resolved YAML files, keyed by absolute path.
///
/// Entries are stored and handed out as deep copies, so a caller that
/// replaces secrets in place never affects what other callers see. When
/// disabled, lookups miss and inserts are dropped.
#[derive(Debug)]
pub struct FileCache {
    enabled: AtomicBool,
    entries: DashMap<(FileKind, PathBuf), Value>,
}

impl FileCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enables or disables the cache. Disabling also drops all entries.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.clear();
        }
    }

    pub fn get(&self, kind: FileKind, path: &Path) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }
        self.entries
            .get(&(kind, path.to_path_buf()))
            .map(|entry| entry.value().clone())
    }

    pub fn insert(&self, kind: FileKind, path: &Path, value: &Value) {
        if self.is_enabled() {
            self.entries.insert((kind, path.to_path_buf()), value.clone());
        }
    }

    pub fn clear(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        if dropped > 0 {
            tracing::debug!(entries = dropped, "Parsed-file cache cleared");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml::serialize_secrets;
    use crate::yaml::value::{Mapping, Secret};

    #[test]
    fn test_hits_are_independent_copies() {
        let cache = FileCache::new(true);
        let path = Path::new("/tmp/env.yaml");
        let mut map = Mapping::new();
        map.insert("pw".into(), Value::Secret(Secret::new("pw.yaml", Value::from("x"))));
        cache.insert(FileKind::Environment, path, &Value::Mapping(map));

        let mut first = cache.get(FileKind::Environment, path).unwrap();
        assert_eq!(serialize_secrets(&mut first).len(), 1);

        // The stored copy still carries its marker.
        let mut second = cache.get(FileKind::Environment, path).unwrap();
        assert_eq!(serialize_secrets(&mut second).len(), 1);
    }

    #[test]
    fn test_disabled_cache_is_pass_through() {
        let cache = FileCache::new(false);
        let path = Path::new("/tmp/env.yaml");
        cache.insert(FileKind::Common, path, &Value::from("x"));
        assert!(cache.get(FileKind::Common, path).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabling_drops_entries() {
        let cache = FileCache::new(true);
        cache.insert(FileKind::Common, Path::new("/a.yaml"), &Value::from(1));
        assert_eq!(cache.len(), 1);

        cache.set_enabled(false);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_kind_is_part_of_the_key() {
        let cache = FileCache::new(true);
        let path = Path::new("/shared.yaml");
        cache.insert(FileKind::Common, path, &Value::from(1));
        assert!(cache.get(FileKind::Secret, path).is_none());
    }
}
