//! Persisted favorites, kept in insertion order for display.

use std::sync::Arc;

use crate::models::VehicleId;
use crate::storage::{KeyValueStore, read_json, write_json};

pub const FAVORITES_KEY: &str = "kfz_favorites";

pub struct Favorites {
    store: Arc<dyn KeyValueStore>,
    ids: Vec<VehicleId>,
}

impl Favorites {
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let mut ids: Vec<VehicleId> = read_json(store.as_ref(), FAVORITES_KEY).unwrap_or_default();
        // Hand-edited storage may carry duplicates
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(*id));
        tracing::debug!(count = ids.len(), "Restored favorites");
        Favorites { store, ids }
    }

    pub fn add(&mut self, id: VehicleId) {
        if self.ids.contains(&id) {
            return;
        }
        self.ids.push(id);
        self.persist();
    }

    pub fn remove(&mut self, id: VehicleId) {
        let before = self.ids.len();
        self.ids.retain(|&existing| existing != id);
        if self.ids.len() != before {
            self.persist();
        }
    }

    /// Returns whether `id` is a favorite afterwards.
    pub fn toggle(&mut self, id: VehicleId) -> bool {
        if self.is_favorite(id) {
            self.remove(id);
            false
        } else {
            self.add(id);
            true
        }
    }

    pub fn is_favorite(&self, id: VehicleId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.persist();
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[VehicleId] {
        &self.ids
    }

    fn persist(&self) {
        if let Err(e) = write_json(self.store.as_ref(), FAVORITES_KEY, &self.ids) {
            tracing::warn!(error = %e, "Failed to persist favorites");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn fresh() -> (Arc<dyn KeyValueStore>, Favorites) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let favorites = Favorites::restore(store.clone());
        (store, favorites)
    }

    #[test]
    fn starts_empty() {
        let (_, favorites) = fresh();
        assert_eq!(favorites.count(), 0);
        assert!(!favorites.is_favorite(1));
    }

    #[test]
    fn add_is_idempotent() {
        let (_, mut favorites) = fresh();
        favorites.add(1);
        favorites.add(1);
        favorites.add(1);
        assert_eq!(favorites.count(), 1);
    }

    #[test]
    fn toggle_twice_restores_membership() {
        let (_, mut favorites) = fresh();
        favorites.add(7);
        assert!(!favorites.toggle(7));
        assert!(favorites.toggle(7));
        assert!(favorites.is_favorite(7));

        assert!(favorites.toggle(8));
        assert!(!favorites.toggle(8));
        assert!(!favorites.is_favorite(8));
    }

    #[test]
    fn every_mutation_is_persisted() {
        let (store, mut favorites) = fresh();
        favorites.add(2);
        favorites.add(1);
        assert_eq!(store.get(FAVORITES_KEY).as_deref(), Some("[2,1]"));

        favorites.remove(2);
        assert_eq!(store.get(FAVORITES_KEY).as_deref(), Some("[1]"));

        favorites.clear();
        assert_eq!(store.get(FAVORITES_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn restores_in_insertion_order() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(FAVORITES_KEY, "[3,1,2,1]").unwrap();
        let favorites = Favorites::restore(store);
        assert_eq!(favorites.ids(), &[3, 1, 2]);
    }

    #[test]
    fn malformed_storage_resets_to_empty() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(FAVORITES_KEY, "{\"not\": \"an array\"}").unwrap();
        let favorites = Favorites::restore(store.clone());
        assert_eq!(favorites.count(), 0);
        assert_eq!(store.get(FAVORITES_KEY), None);
    }
}
