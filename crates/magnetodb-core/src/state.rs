//! Per-project state management.
//!
//! Provides [`TenantStore`], a thread-safe concurrent store that partitions
//! state by project, so identically named tables in two projects never meet.

use std::sync::Arc;

use dashmap::DashMap;

use crate::types::ProjectId;

/// Thread-safe, per-project state store.
///
/// Each project gets its own isolated state instance of type `T`.
///
/// # Examples
///
/// ```
/// use magnetodb_core::{ProjectId, TenantStore};
///
/// #[derive(Debug, Default)]
/// struct Catalog {
///     tables: std::sync::atomic::AtomicU64,
/// }
///
/// let store = TenantStore::<Catalog>::new();
/// let catalog = store.get_or_create(&ProjectId::default());
/// catalog.tables.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
/// ```
#[derive(Debug)]
pub struct TenantStore<T: Default + Send + Sync> {
    inner: DashMap<ProjectId, Arc<T>>,
}

impl<T: Default + Send + Sync> TenantStore<T> {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Get or create the state for the given project.
    ///
    /// If the state does not exist, a new default instance is created atomically.
    #[must_use]
    pub fn get_or_create(&self, project: &ProjectId) -> Arc<T> {
        self.inner
            .entry(project.clone())
            .or_insert_with(|| Arc::new(T::default()))
            .clone()
    }

    /// Get the state for the given project, if it exists.
    #[must_use]
    pub fn get(&self, project: &ProjectId) -> Option<Arc<T>> {
        self.inner.get(project).map(|v| Arc::clone(v.value()))
    }

    /// Remove the state for the given project.
    #[must_use]
    pub fn remove(&self, project: &ProjectId) -> Option<Arc<T>> {
        self.inner.remove(project).map(|(_, v)| v)
    }

    /// Reset all state in the store.
    pub fn reset(&self) {
        self.inner.clear();
    }

    /// Number of projects with state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Default + Send + Sync> Default for TenantStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
