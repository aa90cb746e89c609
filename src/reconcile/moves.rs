//! Reorder and reassign
//!
//! A move is split in two so callers can see the optimistic result before
//! the server answers: [`ReconcileEngine::submit`] validates, applies the
//! change locally and returns a [`PendingMove`]; [`ReconcileEngine::confirm`]
//! sends it and settles the store.
//!
//! Reorders are optimistic and sent in issue order per module. Reassigns
//! are applied locally only once the server accepts them, and while one is
//! outstanding neither of its modules can be reordered.

use std::fmt;

use dragdrop::DropIntent;

use super::activity::{ActivityGuard, InFlightGuard};
use super::engine::ReconcileEngine;
use super::error::{EngineError, EngineResult, Operation};
use super::gate::{MembershipReservation, Ticket};
use crate::api::CourseApi;
use crate::domain::{CourseId, LessonId, LessonPatch, ModuleId};
use crate::store::lock;

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveIntent {
    /// Take the slot of `target` in the lesson's module
    Reorder { lesson: LessonId, target: LessonId },
    /// Move to the end of another module (None = ungrouped)
    Reassign { lesson: LessonId, module_id: Option<ModuleId> },
}

impl From<DropIntent<LessonId, ModuleId>> for MoveIntent {
    fn from(intent: DropIntent<LessonId, ModuleId>) -> Self {
        match intent {
            DropIntent::Reorder { item, target } => MoveIntent::Reorder { lesson: item, target },
            DropIntent::Reassign { item, group } => MoveIntent::Reassign {
                lesson: item,
                module_id: group,
            },
        }
    }
}

/// The request a pending move will send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRequest {
    Reorder {
        course_id: CourseId,
        module_id: Option<ModuleId>,
        /// Complete order of the module
        ordered: Vec<LessonId>,
    },
    Reassign {
        lesson: LessonId,
        from: Option<ModuleId>,
        to: Option<ModuleId>,
    },
}

/// Result of a confirmed move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Reordered {
        module_id: Option<ModuleId>,
        ordered: Vec<LessonId>,
    },
    Reassigned {
        lesson: LessonId,
        from: Option<ModuleId>,
        to: Option<ModuleId>,
    },
}

enum Stage {
    Reorder {
        course_id: CourseId,
        module_id: Option<ModuleId>,
        ordered: Vec<LessonId>,
        ticket: Ticket,
    },
    Reassign {
        from: Option<ModuleId>,
        to: Option<ModuleId>,
        reservation: MembershipReservation,
    },
}

/// A move applied locally and waiting to be confirmed. Dropping it
/// unconfirmed rolls the local change back.
#[must_use = "a pending move does nothing until confirmed"]
pub struct PendingMove {
    lesson: LessonId,
    stage: Stage,
    in_flight: InFlightGuard,
    activity: ActivityGuard,
}

impl PendingMove {
    pub fn lesson(&self) -> &LessonId {
        &self.lesson
    }

    pub fn request(&self) -> MoveRequest {
        match &self.stage {
            Stage::Reorder {
                course_id,
                module_id,
                ordered,
                ..
            } => MoveRequest::Reorder {
                course_id: course_id.clone(),
                module_id: module_id.clone(),
                ordered: ordered.clone(),
            },
            Stage::Reassign { from, to, .. } => MoveRequest::Reassign {
                lesson: self.lesson.clone(),
                from: from.clone(),
                to: to.clone(),
            },
        }
    }

    pub fn operation(&self) -> Operation {
        match self.stage {
            Stage::Reorder { .. } => Operation::ReorderLessons,
            Stage::Reassign { .. } => Operation::MoveLesson,
        }
    }
}

impl fmt::Debug for PendingMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingMove")
            .field("lesson", &self.lesson)
            .field("request", &self.request())
            .finish()
    }
}

/// `current` with `moved` taken out and put in `target`'s slot.
/// None when either is missing or they are the same slot.
pub fn reorder_ids(current: &[LessonId], moved: &LessonId, target: &LessonId) -> Option<Vec<LessonId>> {
    let from = current.iter().position(|id| id == moved)?;
    let to = current.iter().position(|id| id == target)?;
    if from == to {
        return None;
    }
    let mut ordered = current.to_vec();
    let id = ordered.remove(from);
    ordered.insert(to, id);
    Some(ordered)
}

impl<A: CourseApi> ReconcileEngine<A> {
    /// Validate a move and apply it locally. `Ok(None)` means there is
    /// nothing to do (dropped onto itself, already in that module).
    pub fn submit(&self, intent: MoveIntent) -> EngineResult<Option<PendingMove>> {
        let course_id = self.course_id()?;
        match intent {
            MoveIntent::Reorder { lesson, target } => self.submit_reorder(course_id, lesson, target),
            MoveIntent::Reassign { lesson, module_id } => self.submit_reassign(lesson, module_id),
        }
    }

    /// Keyboard move: shift a lesson `offset` slots within its module,
    /// clamped to the ends
    pub fn submit_shift(&self, lesson: &LessonId, offset: i32) -> EngineResult<Option<PendingMove>> {
        let target = self.with_store(|s| {
            let current = s.lesson(lesson).ok_or_else(|| EngineError::UnknownLesson(lesson.clone()))?;
            let members = s.member_ids(current.module_id.as_ref());
            let from = members.iter().position(|id| id == lesson).unwrap_or(0) as i64;
            let last = members.len().saturating_sub(1) as i64;
            let to = (from + i64::from(offset)).clamp(0, last) as usize;
            Ok::<_, EngineError>(members.get(to).cloned())
        })?;

        match target {
            Some(target) => self.submit(MoveIntent::Reorder {
                lesson: lesson.clone(),
                target,
            }),
            None => Ok(None),
        }
    }

    fn submit_reorder(
        &self,
        course_id: CourseId,
        lesson: LessonId,
        target: LessonId,
    ) -> EngineResult<Option<PendingMove>> {
        if lesson == target {
            return Ok(None);
        }

        let mut store = lock(&self.inner.store);
        let source = store
            .lesson(&lesson)
            .ok_or_else(|| EngineError::UnknownLesson(lesson.clone()))?
            .module_id
            .clone();
        let target_module = store
            .lesson(&target)
            .ok_or_else(|| EngineError::UnknownLesson(target.clone()))?
            .module_id
            .clone();

        if source != target_module {
            // Dropped onto a row of another module
            drop(store);
            log::debug!(
                "[Engine] Row drop across modules, moving {} to {:?}",
                lesson,
                target_module
            );
            return self.submit_reassign(lesson, target_module);
        }

        let current = store.member_ids(source.as_ref());
        let Some(ordered) = reorder_ids(&current, &lesson, &target) else {
            return Ok(None);
        };

        let in_flight = self
            .inner
            .in_flight
            .claim(std::slice::from_ref(&lesson), Operation::ReorderLessons)
            .map_err(EngineError::Busy)?;
        let Some(ticket) = Ticket::issue(self.gate(source.as_ref()), self.inner.store.clone(), source.clone()) else {
            log::debug!("[Engine] Reorder of {:?} refused: membership change in flight", source);
            return Err(EngineError::ModuleBusy(source));
        };
        let activity = self.inner.activity.start(Operation::ReorderLessons);
        store.apply_order(source.as_ref(), &ordered);
        drop(store);

        log::debug!("[Engine] Reorder {} onto {} in {:?} applied locally", lesson, target, source);
        Ok(Some(PendingMove {
            lesson,
            stage: Stage::Reorder {
                course_id,
                module_id: source,
                ordered,
                ticket,
            },
            in_flight,
            activity,
        }))
    }

    fn submit_reassign(&self, lesson: LessonId, module_id: Option<ModuleId>) -> EngineResult<Option<PendingMove>> {
        self.require_module(module_id.as_ref())?;
        let from = self
            .with_store(|s| s.lesson(&lesson).map(|l| l.module_id.clone()))
            .ok_or_else(|| EngineError::UnknownLesson(lesson.clone()))?;
        if from == module_id {
            return Ok(None);
        }

        let in_flight = self
            .inner
            .in_flight
            .claim(std::slice::from_ref(&lesson), Operation::MoveLesson)
            .map_err(EngineError::Busy)?;
        let reservation = self.reserve_modules([from.as_ref(), module_id.as_ref()])?;
        let activity = self.inner.activity.start(Operation::MoveLesson);

        Ok(Some(PendingMove {
            lesson,
            stage: Stage::Reassign {
                from,
                to: module_id,
                reservation,
            },
            in_flight,
            activity,
        }))
    }

    /// Send a pending move and settle the store with the answer
    pub async fn confirm(&self, pending: PendingMove) -> EngineResult<MoveOutcome> {
        let PendingMove {
            lesson,
            stage,
            in_flight,
            activity,
        } = pending;

        let result = match stage {
            Stage::Reorder {
                course_id,
                module_id,
                ordered,
                ticket,
            } => self.confirm_reorder(course_id, module_id, ordered, ticket).await,
            Stage::Reassign { from, to, reservation } => {
                let result = self.confirm_reassign(lesson, from, to).await;
                drop(reservation);
                result
            }
        };

        drop(in_flight);
        drop(activity);
        self.refresh_if_idle().await;
        result
    }

    /// Submit and confirm in one go
    pub async fn apply(&self, intent: MoveIntent) -> EngineResult<Option<MoveOutcome>> {
        match self.submit(intent)? {
            Some(pending) => self.confirm(pending).await.map(Some),
            None => Ok(None),
        }
    }

    async fn confirm_reorder(
        &self,
        course_id: CourseId,
        module_id: Option<ModuleId>,
        ordered: Vec<LessonId>,
        ticket: Ticket,
    ) -> EngineResult<MoveOutcome> {
        ticket.wait_turn().await;
        if !ticket.is_current() {
            ticket.skip();
            log::info!("[Engine] Skipping stale reorder of {:?}", module_id);
            return Err(EngineError::Superseded {
                operation: Operation::ReorderLessons,
            });
        }

        match self
            .inner
            .api
            .reorder_lessons(&course_id, &ordered, module_id.as_ref())
            .await
        {
            Ok(()) => {
                self.with_store(|s| s.confirm_order(module_id.as_ref(), &ordered));
                ticket.succeed();
                log::info!("[Engine] Reordered {} lessons in {:?}", ordered.len(), module_id);
                Ok(MoveOutcome::Reordered { module_id, ordered })
            }
            Err(e) => {
                log::error!("[Engine] Reorder of {:?} failed, reverting: {}", module_id, e);
                ticket.fail();
                Err(EngineError::failed(Operation::ReorderLessons)(e))
            }
        }
    }

    async fn confirm_reassign(
        &self,
        lesson: LessonId,
        from: Option<ModuleId>,
        to: Option<ModuleId>,
    ) -> EngineResult<MoveOutcome> {
        let updated = self
            .inner
            .api
            .update_lesson(&lesson, &LessonPatch::module(to.clone()))
            .await
            .map_err(|e| {
                log::error!("[Engine] Moving {} to {:?} failed: {}", lesson, to, e);
                EngineError::failed(Operation::MoveLesson)(e)
            })?;

        self.with_store(|s| {
            s.move_to_module(&lesson, to.as_ref());
            s.merge_server_fields(updated);
            s.confirm_lesson(&lesson);
        });
        log::info!("[Engine] Moved {} from {:?} to {:?}", lesson, from, to);
        Ok(MoveOutcome::Reassigned { lesson, from, to })
    }
}
