//! Session-only comparison list, capped at three vehicles.
//! Insertion order is the column order of the comparison table.

use crate::models::VehicleId;

pub const MAX_COMPARE: usize = 3;

#[derive(Debug, Default, Clone)]
pub struct CompareSet {
    ids: Vec<VehicleId>,
}

impl CompareSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `id` ended up in the set.
    pub fn add(&mut self, id: VehicleId) -> bool {
        if self.ids.contains(&id) {
            return true;
        }
        if !self.can_add_more() {
            tracing::debug!(id, "Compare set is full, ignoring add");
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn remove(&mut self, id: VehicleId) {
        self.ids.retain(|&existing| existing != id);
    }

    pub fn toggle(&mut self, id: VehicleId) -> bool {
        if self.is_in_compare(id) {
            self.remove(id);
            false
        } else {
            self.add(id)
        }
    }

    pub fn is_in_compare(&self, id: VehicleId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn can_add_more(&self) -> bool {
        self.ids.len() < MAX_COMPARE
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn max(&self) -> usize {
        MAX_COMPARE
    }

    pub fn ids(&self) -> &[VehicleId] {
        &self.ids
    }
}
