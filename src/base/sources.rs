//! Source path registry backing [`SourceId`].

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fmt;

use super::SourceId;

/// Registry mapping source paths to [`SourceId`] handles.
///
/// Thread-safe via internal locking.
#[derive(Default)]
pub struct SourceSet {
    inner: RwLock<SourceSetInner>,
}

#[derive(Default)]
struct SourceSetInner {
    /// Map from path to index
    map: FxHashMap<SmolStr, u32>,
    /// Storage of all registered paths
    paths: Vec<SmolStr>,
}

impl SourceSet {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path, returning a `SourceId` handle.
    ///
    /// If the path has been registered before, returns the existing id.
    pub fn register(&self, path: &str) -> SourceId {
        // Fast path: already registered (read lock)
        {
            let inner = self.inner.read();
            if let Some(&index) = inner.map.get(path) {
                return SourceId::new(index);
            }
        }

        // Slow path: need to insert (write lock)
        let mut inner = self.inner.write();

        // Double-check after acquiring write lock
        if let Some(&index) = inner.map.get(path) {
            return SourceId::new(index);
        }

        let smol = SmolStr::new(path);
        let index = inner.paths.len() as u32;
        inner.paths.push(smol.clone());
        inner.map.insert(smol, index);

        SourceId::new(index)
    }

    /// Look up the path for a `SourceId`.
    ///
    /// Returns `None` if the id was created by a different registry.
    pub fn path(&self, id: SourceId) -> Option<SmolStr> {
        let inner = self.inner.read();
        inner.paths.get(id.index() as usize).cloned()
    }

    /// Get the number of registered paths.
    pub fn len(&self) -> usize {
        self.inner.read().paths.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SourceSet")
            .field("count", &inner.paths.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_same_path() {
        let sources = SourceSet::new();

        let a = sources.register("lib/hello.weld");
        let b = sources.register("lib/hello.weld");

        assert_eq!(a, b);
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn test_register_different_paths() {
        let sources = SourceSet::new();

        let a = sources.register("a.weld");
        let b = sources.register("b.weld");

        assert_ne!(a, b);
        assert_eq!(sources.path(a).as_deref(), Some("a.weld"));
        assert_eq!(sources.path(b).as_deref(), Some("b.weld"));
    }
}
