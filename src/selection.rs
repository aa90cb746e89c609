//! Bulk selection
//!
//! Selection is always a subset of the visible lessons: selecting goes
//! through the current view and every filter change prunes it.

use std::collections::BTreeSet;

use crate::domain::LessonId;
use crate::reconcile::BatchResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<LessonId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &LessonId) -> bool {
        self.ids.contains(id)
    }

    /// Selected ids in the order they appear in `visible`
    pub fn ordered(&self, visible: &[LessonId]) -> Vec<LessonId> {
        visible.iter().filter(|id| self.ids.contains(*id)).cloned().collect()
    }

    /// Flip one lesson. Hidden lessons cannot be selected.
    pub fn toggle(&mut self, id: &LessonId, visible: &[LessonId]) -> bool {
        if self.ids.remove(id) {
            return false;
        }
        if visible.contains(id) {
            self.ids.insert(id.clone());
            return true;
        }
        false
    }

    /// Select exactly the visible lessons
    pub fn select_all(&mut self, visible: &[LessonId]) {
        self.ids = visible.iter().cloned().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids no longer visible; returns how many were dropped
    pub fn retain_visible(&mut self, visible: &[LessonId]) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| visible.contains(id));
        before - self.ids.len()
    }

    /// Keep only the lessons the batch failed on, so a retry targets them
    pub fn apply_result(&mut self, result: &BatchResult) {
        for id in &result.succeeded {
            self.ids.remove(id);
        }
    }
}
