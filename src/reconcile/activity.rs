//! In-flight bookkeeping
//!
//! Two registries: which lessons have an unacknowledged mutation (drives the
//! busy guard), and how many requests of each class are outstanding (drives
//! loading indicators). Both are released by guards on drop, so an early
//! return or a cancelled future never leaks a busy flag.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::error::Operation;
use crate::domain::LessonId;
use crate::store::lock;

/// Operation class shown by the loading indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityClass {
    Fetch,
    Create,
    Update,
    Delete,
    Reorder,
    Export,
}

/// Outstanding request counts per class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySnapshot {
    counts: HashMap<ActivityClass, usize>,
}

impl ActivitySnapshot {
    pub fn count(&self, class: ActivityClass) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn is_active(&self, class: ActivityClass) -> bool {
        self.count(class) > 0
    }

    pub fn is_idle(&self) -> bool {
        self.counts.values().all(|c| *c == 0)
    }
}

#[derive(Debug, Default)]
pub struct ActivityTracker {
    counts: Mutex<HashMap<ActivityClass, usize>>,
}

impl ActivityTracker {
    pub fn start(self: &Arc<Self>, operation: Operation) -> ActivityGuard {
        *lock(&self.counts).entry(operation.class()).or_insert(0) += 1;
        log::debug!("[Engine] Started: {}", operation);
        ActivityGuard {
            tracker: Arc::clone(self),
            operation,
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot {
            counts: lock(&self.counts).clone(),
        }
    }

    fn finish(&self, class: ActivityClass) {
        let mut counts = lock(&self.counts);
        if let Some(count) = counts.get_mut(&class) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Counts one outstanding request until dropped
#[derive(Debug)]
pub struct ActivityGuard {
    tracker: Arc<ActivityTracker>,
    operation: Operation,
    started: Instant,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.tracker.finish(self.operation.class());
        log::debug!("[Engine] Finished: {} in {:?}", self.operation, self.started.elapsed());
    }
}

/// Lessons with an unacknowledged mutation
#[derive(Debug, Default)]
pub struct InFlightLessons {
    lessons: Mutex<HashMap<LessonId, Operation>>,
}

impl InFlightLessons {
    pub fn operation_for(&self, id: &LessonId) -> Option<Operation> {
        lock(&self.lessons).get(id).copied()
    }

    pub fn is_busy(&self, id: &LessonId) -> bool {
        lock(&self.lessons).contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.lessons).is_empty()
    }

    /// Mark every id busy, or none of them. Fails with the first id that
    /// is already busy.
    pub fn claim(self: &Arc<Self>, ids: &[LessonId], operation: Operation) -> Result<InFlightGuard, LessonId> {
        let mut lessons = lock(&self.lessons);
        if let Some(busy) = ids.iter().find(|id| lessons.contains_key(*id)) {
            return Err(busy.clone());
        }
        for id in ids {
            lessons.insert(id.clone(), operation);
        }
        Ok(InFlightGuard {
            registry: Arc::clone(self),
            ids: ids.to_vec(),
        })
    }

    fn release(&self, ids: &[LessonId]) {
        let mut lessons = lock(&self.lessons);
        for id in ids {
            lessons.remove(id);
        }
    }
}

/// Keeps lessons marked busy until dropped
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightLessons>,
    ids: Vec<LessonId>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.release(&self.ids);
    }
}
