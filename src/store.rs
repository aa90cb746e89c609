//! Local Ordering Store
//!
//! Session-authoritative copy of one course's lessons and modules.
//! Lessons are kept flat; module membership is always derived from
//! `Lesson::module_id`, so a lesson can never sit in two modules.
//!
//! Alongside the working placements the store remembers the placement the
//! server last confirmed for every lesson, which is what a failed optimistic
//! move reverts to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{CourseId, Lesson, LessonId, Module, ModuleId, Placement};

/// Store handle shared by the engine and the dashboard
pub type SharedStore = Arc<Mutex<OrderingStore>>;

/// Lock a std mutex, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A lesson taken out of the store, restorable into its old arena slot
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedLesson {
    index: usize,
    lesson: Lesson,
    confirmed: Option<Placement>,
}

impl RemovedLesson {
    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderingStore {
    course_id: Option<CourseId>,
    /// All lessons of the course, in arrival order
    lessons: Vec<Lesson>,
    modules: Vec<Module>,
    /// Last placement acknowledged by the server
    confirmed: HashMap<LessonId, Placement>,
    /// Bumped on every mutation so projections know to recompute
    revision: u64,
}

impl OrderingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn course_id(&self) -> Option<&CourseId> {
        self.course_id.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn lesson(&self, id: &LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == *id)
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == *id)
    }

    /// The ungrouped bucket always exists
    pub fn has_module(&self, id: Option<&ModuleId>) -> bool {
        match id {
            Some(id) => self.module(id).is_some(),
            None => true,
        }
    }

    /// Members of a module ordered by position; ties keep arrival order
    pub fn members(&self, module_id: Option<&ModuleId>) -> Vec<&Lesson> {
        let mut members: Vec<&Lesson> = self
            .lessons
            .iter()
            .filter(|l| l.module_id.as_ref() == module_id)
            .collect();
        members.sort_by_key(|l| l.position);
        members
    }

    pub fn member_ids(&self, module_id: Option<&ModuleId>) -> Vec<LessonId> {
        self.members(module_id).into_iter().map(|l| l.id.clone()).collect()
    }

    /// Next free position at the end of a module
    pub fn next_position(&self, module_id: Option<&ModuleId>) -> i32 {
        self.lessons
            .iter()
            .filter(|l| l.module_id.as_ref() == module_id)
            .map(|l| l.position)
            .max()
            .map_or(0, |max| max + 1)
    }

    pub fn confirmed_placement(&self, id: &LessonId) -> Option<&Placement> {
        self.confirmed.get(id)
    }

    /// True when the lesson's working placement matches the server's
    pub fn is_confirmed(&self, id: &LessonId) -> bool {
        match (self.lesson(id), self.confirmed.get(id)) {
            (Some(lesson), Some(confirmed)) => lesson.placement() == *confirmed,
            _ => false,
        }
    }

    /// Positions of the module form 0..n-1 with no duplicates
    pub fn positions_are_dense(&self, module_id: Option<&ModuleId>) -> bool {
        self.members(module_id)
            .iter()
            .enumerate()
            .all(|(index, lesson)| lesson.position == index as i32)
    }

    // ========================
    // Mutations
    // ========================

    /// Replace everything with server data; all placements become confirmed
    pub fn replace_all(&mut self, course_id: CourseId, modules: Vec<Module>, mut lessons: Vec<Lesson>) {
        for lesson in lessons.iter_mut() {
            if let Some(module_id) = &lesson.module_id {
                if !modules.iter().any(|m| m.id == *module_id) {
                    log::warn!(
                        "[Store] Lesson {} references unknown module {}, treating as ungrouped",
                        lesson.id,
                        module_id
                    );
                    lesson.module_id = None;
                }
            }
        }

        self.confirmed = lessons.iter().map(|l| (l.id.clone(), l.placement())).collect();
        self.course_id = Some(course_id);
        self.modules = modules;
        self.lessons = lessons;
        self.bump();
    }

    /// Apply a full module order, renumbering its members 0..n-1.
    /// Returns false (and changes nothing) unless `ordered` is exactly the
    /// module's current membership.
    pub fn apply_order(&mut self, module_id: Option<&ModuleId>, ordered: &[LessonId]) -> bool {
        let mut current = self.member_ids(module_id);
        if current.len() != ordered.len() {
            return false;
        }
        current.sort();
        let mut requested = ordered.to_vec();
        requested.sort();
        if current != requested {
            return false;
        }

        for (position, id) in ordered.iter().enumerate() {
            if let Some(lesson) = self.lessons.iter_mut().find(|l| l.id == *id) {
                lesson.position = position as i32;
            }
        }
        self.bump();
        true
    }

    /// Renumber a module's lessons 0, 1, 2, ...
    fn reindex_members(&mut self, module_id: Option<&ModuleId>) {
        let ids = self.member_ids(module_id);
        for (position, id) in ids.iter().enumerate() {
            if let Some(lesson) = self.lessons.iter_mut().find(|l| l.id == *id) {
                lesson.position = position as i32;
            }
        }
    }

    /// Move a lesson to the end of another module in a single mutation.
    /// The module it leaves is reindexed.
    pub fn move_to_module(&mut self, id: &LessonId, target: Option<&ModuleId>) -> bool {
        let Some(index) = self.lessons.iter().position(|l| l.id == *id) else {
            return false;
        };
        let source = self.lessons[index].module_id.clone();
        if source.as_ref() == target {
            return false;
        }

        let position = self.next_position(target);
        let lesson = &mut self.lessons[index];
        lesson.module_id = target.cloned();
        lesson.position = position;
        self.reindex_members(source.as_ref());
        self.bump();
        true
    }

    /// Record `ordered` as the server-acknowledged order of a module
    pub fn confirm_order(&mut self, module_id: Option<&ModuleId>, ordered: &[LessonId]) {
        for (position, id) in ordered.iter().enumerate() {
            self.confirmed.insert(
                id.clone(),
                Placement {
                    module_id: module_id.cloned(),
                    position: position as i32,
                },
            );
        }
    }

    /// Record the lesson's working placement as confirmed
    pub fn confirm_lesson(&mut self, id: &LessonId) {
        if let Some(placement) = self.lesson(id).map(Lesson::placement) {
            self.confirmed.insert(id.clone(), placement);
        }
    }

    /// Restore the confirmed placement of every lesson that is, or was
    /// confirmed to be, in `module_id`. Returns the number of lessons moved.
    pub fn revert_module(&mut self, module_id: Option<&ModuleId>) -> usize {
        let mut reverted = 0;
        for lesson in self.lessons.iter_mut() {
            let Some(confirmed) = self.confirmed.get(&lesson.id) else {
                continue;
            };
            let involved = lesson.module_id.as_ref() == module_id
                || confirmed.module_id.as_ref() == module_id;
            if involved && lesson.placement() != *confirmed {
                lesson.set_placement(confirmed.clone());
                reverted += 1;
            }
        }
        if reverted > 0 {
            log::info!("[Store] Reverted {} lesson(s) in module {:?}", reverted, module_id);
            self.bump();
        }
        reverted
    }

    /// Add a lesson the server just created
    pub fn insert_lesson(&mut self, mut lesson: Lesson) {
        if !self.has_module(lesson.module_id.as_ref()) {
            lesson.module_id = None;
        }
        self.confirmed.insert(lesson.id.clone(), lesson.placement());
        match self.lessons.iter_mut().find(|l| l.id == lesson.id) {
            Some(existing) => *existing = lesson,
            None => self.lessons.push(lesson),
        }
        self.bump();
    }

    /// Edit a lesson in place by ID
    pub fn update_lesson(&mut self, id: &LessonId, edit: impl FnOnce(&mut Lesson)) -> bool {
        match self.lessons.iter_mut().find(|l| l.id == *id) {
            Some(lesson) => {
                edit(lesson);
                self.bump();
                true
            }
            None => false,
        }
    }

    /// Take server fields for a lesson while keeping its local placement
    pub fn merge_server_fields(&mut self, server: Lesson) -> bool {
        let id = server.id.clone();
        self.update_lesson(&id, |lesson| {
            let placement = lesson.placement();
            *lesson = server;
            lesson.set_placement(placement);
        })
    }

    /// Remove a lesson by ID. Other modules keep their positions.
    pub fn remove_lesson(&mut self, id: &LessonId) -> Option<RemovedLesson> {
        let index = self.lessons.iter().position(|l| l.id == *id)?;
        let lesson = self.lessons.remove(index);
        let confirmed = self.confirmed.remove(id);
        self.bump();
        Some(RemovedLesson { index, lesson, confirmed })
    }

    /// Put a removed lesson back where it was
    pub fn restore_lesson(&mut self, removed: RemovedLesson) {
        let RemovedLesson { index, lesson, confirmed } = removed;
        if let Some(confirmed) = confirmed {
            self.confirmed.insert(lesson.id.clone(), confirmed);
        }
        let index = index.min(self.lessons.len());
        self.lessons.insert(index, lesson);
        self.bump();
    }

    /// Add or replace a module by ID
    pub fn upsert_module(&mut self, module: Module) {
        match self.modules.iter_mut().find(|m| m.id == module.id) {
            Some(existing) => *existing = module,
            None => self.modules.push(module),
        }
        self.bump();
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
