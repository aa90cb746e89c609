//! Reconciliation Engine
//!
//! Sits between the ordering store and the remote course store. Every
//! mutation is applied locally, sent to the server, then either confirmed
//! or rolled back. The individual operation families live in sibling
//! modules as further `impl` blocks on [`ReconcileEngine`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::activity::{ActivitySnapshot, ActivityTracker, InFlightLessons};
use super::error::{EngineError, EngineResult, Operation};
use super::gate::{MembershipReservation, SequenceGate};
use crate::api::CourseApi;
use crate::domain::{CourseId, LessonId, ModuleId};
use crate::store::{lock, OrderingStore, SharedStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Re-fetch the course once nothing is in flight after a mutation
    pub refresh_after_mutation: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            refresh_after_mutation: true,
        }
    }
}

pub(crate) struct EngineInner<A> {
    pub(crate) api: Arc<A>,
    pub(crate) store: SharedStore,
    pub(crate) in_flight: Arc<InFlightLessons>,
    pub(crate) activity: Arc<ActivityTracker>,
    gates: Mutex<HashMap<Option<ModuleId>, Arc<SequenceGate>>>,
    options: EngineOptions,
}

/// Cheap to clone; clones share the same store and bookkeeping
pub struct ReconcileEngine<A> {
    pub(crate) inner: Arc<EngineInner<A>>,
}

impl<A> Clone for ReconcileEngine<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: CourseApi> ReconcileEngine<A> {
    pub fn new(api: Arc<A>, store: SharedStore, options: EngineOptions) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                api,
                store,
                in_flight: Arc::new(InFlightLessons::default()),
                activity: Arc::new(ActivityTracker::default()),
                gates: Mutex::new(HashMap::new()),
                options,
            }),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.inner.api
    }

    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    pub fn options(&self) -> EngineOptions {
        self.inner.options
    }

    /// Run `f` against the locked store
    pub fn with_store<R>(&self, f: impl FnOnce(&mut OrderingStore) -> R) -> R {
        f(&mut lock(&self.inner.store))
    }

    pub fn course_id(&self) -> EngineResult<CourseId> {
        self.with_store(|s| s.course_id().cloned()).ok_or(EngineError::NoCourse)
    }

    /// True while the lesson has a mutation awaiting acknowledgement
    pub fn is_busy(&self, id: &LessonId) -> bool {
        self.inner.in_flight.is_busy(id)
    }

    pub fn pending_operation(&self, id: &LessonId) -> Option<Operation> {
        self.inner.in_flight.operation_for(id)
    }

    pub fn is_idle(&self) -> bool {
        self.inner.in_flight.is_empty()
    }

    pub fn activity(&self) -> ActivitySnapshot {
        self.inner.activity.snapshot()
    }

    /// Fetch a course and make it the store's content
    pub async fn load(&self, course_id: CourseId) -> EngineResult<()> {
        let _activity = self.inner.activity.start(Operation::LoadCourse);
        let api = &self.inner.api;
        let (modules, lessons) = tokio::try_join!(api.list_modules(&course_id), api.list_lessons(&course_id))
            .map_err(EngineError::failed(Operation::LoadCourse))?;

        log::info!(
            "[Engine] Loaded course {}: {} modules, {} lessons",
            course_id,
            modules.len(),
            lessons.len()
        );
        self.with_store(|s| s.replace_all(course_id, modules, lessons));
        Ok(())
    }

    /// Re-fetch the open course. The result is discarded if the store
    /// changed while the fetch was running, or if anything is still in
    /// flight. Returns whether the fetched data was applied.
    pub async fn refresh(&self) -> EngineResult<bool> {
        let (course_id, revision) = self.with_store(|s| (s.course_id().cloned(), s.revision()));
        let course_id = course_id.ok_or(EngineError::NoCourse)?;
        let _activity = self.inner.activity.start(Operation::LoadCourse);
        let api = &self.inner.api;
        let (modules, lessons) = tokio::try_join!(api.list_modules(&course_id), api.list_lessons(&course_id))
            .map_err(EngineError::failed(Operation::LoadCourse))?;

        let mut store = lock(&self.inner.store);
        if store.revision() != revision {
            log::debug!("[Engine] Dropping refresh of {}: store changed during fetch", course_id);
            return Ok(false);
        }
        if !self.inner.in_flight.is_empty() {
            log::debug!("[Engine] Dropping refresh of {}: mutations in flight", course_id);
            return Ok(false);
        }
        store.replace_all(course_id, modules, lessons);
        Ok(true)
    }

    /// Post-mutation refresh. Skipped while anything is still unconfirmed.
    pub(crate) async fn refresh_if_idle(&self) {
        if !self.inner.options.refresh_after_mutation {
            return;
        }
        if !self.is_idle() {
            log::debug!("[Engine] Deferring refresh: mutations in flight");
            return;
        }
        if let Err(e) = self.refresh().await {
            log::warn!("[Engine] Refresh after mutation failed: {}", e);
        }
    }

    pub(crate) fn gate(&self, module_id: Option<&ModuleId>) -> Arc<SequenceGate> {
        let mut gates = lock(&self.inner.gates);
        Arc::clone(
            gates
                .entry(module_id.cloned())
                .or_insert_with(|| Arc::new(SequenceGate::new())),
        )
    }

    /// Hold off reorders of `modules` while their membership changes.
    /// Fails with `ModuleBusy` if one of them has reorders queued.
    pub(crate) fn reserve_modules<'a>(
        &self,
        modules: impl IntoIterator<Item = Option<&'a ModuleId>>,
    ) -> EngineResult<MembershipReservation> {
        let mut reservation = MembershipReservation::default();
        for module_id in modules {
            if !reservation.hold(self.gate(module_id)) {
                return Err(EngineError::ModuleBusy(module_id.cloned()));
            }
        }
        Ok(reservation)
    }

    /// Fails with `UnknownLesson` unless every id is in the store
    pub(crate) fn require_lessons(&self, ids: &[LessonId]) -> EngineResult<()> {
        self.with_store(|s| match ids.iter().find(|id| s.lesson(id).is_none()) {
            Some(missing) => Err(EngineError::UnknownLesson(missing.clone())),
            None => Ok(()),
        })
    }

    pub(crate) fn require_module(&self, module_id: Option<&ModuleId>) -> EngineResult<()> {
        match module_id {
            Some(id) if !self.with_store(|s| s.has_module(Some(id))) => Err(EngineError::UnknownModule(id.clone())),
            _ => Ok(()),
        }
    }
}
