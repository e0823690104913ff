//! Session cache for loaded content.
//!
//! Holds one bundle at a time behind an `Arc`, so resolutions keep working on
//! the snapshot they started with while a reload swaps in a new one. Every
//! swap bumps the generation, which callers can use to drop derived data.

use crate::content::{ContentBundle, LoadError};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct CacheState {
    bundle: Arc<ContentBundle>,
    generation: u64,
}

/// Explicitly owned cache of the active content bundle.
#[derive(Debug)]
pub struct ContentCache {
    state: RwLock<CacheState>,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(ContentBundle::new())
    }
}

impl ContentCache {
    /// Create a cache holding `bundle` as generation 0.
    pub fn new(bundle: ContentBundle) -> Self {
        Self {
            state: RwLock::new(CacheState {
                bundle: Arc::new(bundle),
                generation: 0,
            }),
        }
    }

    /// Create a cache from a bundle file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let bundle = ContentBundle::load_json(path).await?;
        Ok(Self::new(bundle))
    }

    /// The current bundle. Cheap; clones an `Arc`.
    pub async fn snapshot(&self) -> Arc<ContentBundle> {
        Arc::clone(&self.state.read().await.bundle)
    }

    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Replace the bundle. Returns the new generation.
    pub async fn reload(&self, bundle: ContentBundle) -> u64 {
        let mut state = self.state.write().await;
        state.bundle = Arc::new(bundle);
        state.generation += 1;
        tracing::info!(generation = state.generation, "content bundle reloaded");
        state.generation
    }

    /// Load a bundle file and swap it in. On failure the old bundle stays.
    pub async fn reload_from_file(&self, path: impl AsRef<Path>) -> Result<u64, LoadError> {
        let bundle = ContentBundle::load_json(path).await?;
        Ok(self.reload(bundle).await)
    }

    /// Drop the cached content, leaving an empty bundle.
    pub async fn invalidate(&self) -> u64 {
        let mut state = self.state.write().await;
        state.bundle = Arc::new(ContentBundle::new());
        state.generation += 1;
        tracing::debug!(generation = state.generation, "content cache invalidated");
        state.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::ClassProgression;

    #[tokio::test]
    async fn test_reload_bumps_generation_and_keeps_old_snapshot() {
        let cache = ContentCache::new(ContentBundle::new().with_class(ClassProgression::new("fighter", "Fighter")));
        let before = cache.snapshot().await;
        assert_eq!(cache.generation().await, 0);

        let generation = cache
            .reload(ContentBundle::new().with_class(ClassProgression::new("wizard", "Wizard")))
            .await;
        assert_eq!(generation, 1);

        // The old snapshot is unaffected by the swap.
        assert!(before.progression("fighter").is_some());
        let after = cache.snapshot().await;
        assert!(after.progression("fighter").is_none());
        assert!(after.progression("wizard").is_some());
    }

    #[tokio::test]
    async fn test_invalidate_empties_cache() {
        let cache = ContentCache::new(ContentBundle::new().with_class(ClassProgression::new("fighter", "Fighter")));
        cache.invalidate().await;
        assert!(cache.snapshot().await.is_empty());
        assert_eq!(cache.generation().await, 1);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_bundle() {
        let cache = ContentCache::new(ContentBundle::new().with_class(ClassProgression::new("fighter", "Fighter")));
        let result = cache.reload_from_file("/nonexistent/bundle.json").await;
        assert!(matches!(result, Err(LoadError::Io(_))));
        assert!(cache.snapshot().await.progression("fighter").is_some());
        assert_eq!(cache.generation().await, 0);
    }
}
