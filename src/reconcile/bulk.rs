//! Batch operations over selected lessons
//!
//! Status changes and deletes are applied optimistically to every selected
//! lesson. The server may answer for the batch as a whole or per item; any
//! item it did not explicitly accept is rolled back.

use std::collections::HashMap;

use super::engine::ReconcileEngine;
use super::error::{EngineError, EngineResult, Operation};
use crate::api::{BatchReport, CourseApi};
use crate::domain::{DomainError, ExportFormat, LessonId, ModuleId, PublishStatus};

/// Per-item split of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub operation: Operation,
    pub succeeded: Vec<LessonId>,
    pub failed: Vec<(LessonId, DomainError)>,
}

impl BatchResult {
    fn from_report(operation: Operation, ids: &[LessonId], report: BatchReport) -> Self {
        let outcomes = match report {
            BatchReport::Atomic => {
                return Self {
                    operation,
                    succeeded: ids.to_vec(),
                    failed: Vec::new(),
                }
            }
            BatchReport::PerItem(outcomes) => outcomes,
        };

        let mut by_id: HashMap<LessonId, Option<DomainError>> =
            outcomes.into_iter().map(|o| (o.id, o.error)).collect();
        let mut result = Self {
            operation,
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for id in ids {
            match by_id.remove(id) {
                Some(None) => result.succeeded.push(id.clone()),
                Some(Some(error)) => result.failed.push((id.clone(), error)),
                None => result.failed.push((
                    id.clone(),
                    DomainError::Internal("no result reported for this lesson".to_string()),
                )),
            }
        }
        result
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<LessonId> {
        self.failed.iter().map(|(id, _)| id.clone()).collect()
    }

    /// One line per failed lesson, for the error banner
    pub fn failure_summary(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .failed
            .iter()
            .map(|(id, error)| format!("{}: {}", id, error))
            .collect();
        Some(format!(
            "Could not {} ({} of {}):\n{}",
            self.operation,
            self.failed.len(),
            self.failed.len() + self.succeeded.len(),
            lines.join("\n")
        ))
    }
}

impl<A: CourseApi> ReconcileEngine<A> {
    fn check_selection(&self, ids: &[LessonId]) -> EngineResult<()> {
        if ids.is_empty() {
            return Err(EngineError::Validation("select at least one lesson".to_string()));
        }
        self.require_lessons(ids)
    }

    pub async fn bulk_set_status(&self, ids: &[LessonId], status: PublishStatus) -> EngineResult<BatchResult> {
        self.check_selection(ids)?;
        let operation = Operation::UpdateStatuses;
        let in_flight = self.inner.in_flight.claim(ids, operation).map_err(EngineError::Busy)?;
        let activity = self.inner.activity.start(operation);

        let previous: Vec<(LessonId, PublishStatus)> = self.with_store(|s| {
            ids.iter()
                .filter_map(|id| {
                    let before = s.lesson(id)?.status;
                    s.update_lesson(id, |l| l.status = status);
                    Some((id.clone(), before))
                })
                .collect()
        });
        let restore = |failed: &[LessonId]| {
            self.with_store(|s| {
                for (id, before) in previous.iter().filter(|(id, _)| failed.contains(id)) {
                    s.update_lesson(id, |l| l.status = *before);
                }
            })
        };

        let result = match self.inner.api.bulk_update_status(ids, status).await {
            Ok(report) => {
                let result = BatchResult::from_report(operation, ids, report);
                restore(result.failed_ids().as_slice());
                Ok(result)
            }
            Err(e) => {
                log::error!("[Engine] Bulk status change of {} lessons failed: {}", ids.len(), e);
                restore(ids);
                Err(EngineError::failed(operation)(e))
            }
        };

        drop(in_flight);
        drop(activity);
        self.refresh_if_idle().await;
        result
    }

    /// Publish everything if any selected lesson is a draft, otherwise
    /// revert everything to draft
    pub async fn bulk_toggle_status(&self, ids: &[LessonId]) -> EngineResult<BatchResult> {
        self.check_selection(ids)?;
        let any_draft = self.with_store(|s| {
            ids.iter()
                .filter_map(|id| s.lesson(id))
                .any(|l| l.status == PublishStatus::Draft)
        });
        let status = if any_draft {
            PublishStatus::Published
        } else {
            PublishStatus::Draft
        };
        self.bulk_set_status(ids, status).await
    }

    pub async fn bulk_delete(&self, ids: &[LessonId]) -> EngineResult<BatchResult> {
        self.check_selection(ids)?;
        let operation = Operation::DeleteLessons;
        let in_flight = self.inner.in_flight.claim(ids, operation).map_err(EngineError::Busy)?;
        let modules: Vec<Option<ModuleId>> =
            self.with_store(|s| ids.iter().filter_map(|id| s.lesson(id)).map(|l| l.module_id.clone()).collect());
        let reservation = self.reserve_modules(modules.iter().map(Option::as_ref))?;
        let activity = self.inner.activity.start(operation);

        let removed = self.with_store(|s| ids.iter().filter_map(|id| s.remove_lesson(id)).collect::<Vec<_>>());
        let restore = |failed: &[LessonId]| {
            self.with_store(|s| {
                // Reverse removal order puts each lesson back in its old slot
                for lesson in removed.iter().rev().filter(|r| failed.contains(&r.lesson().id)) {
                    s.restore_lesson(lesson.clone());
                }
            })
        };

        let result = match self.inner.api.bulk_delete(ids).await {
            Ok(report) => {
                let result = BatchResult::from_report(operation, ids, report);
                restore(result.failed_ids().as_slice());
                log::info!(
                    "[Engine] Deleted {} lessons, {} failed",
                    result.succeeded.len(),
                    result.failed.len()
                );
                Ok(result)
            }
            Err(e) => {
                log::error!("[Engine] Bulk delete of {} lessons failed: {}", ids.len(), e);
                restore(ids);
                Err(EngineError::failed(operation)(e))
            }
        };

        drop(reservation);
        drop(in_flight);
        drop(activity);
        self.refresh_if_idle().await;
        result
    }

    /// Export never touches the store
    pub async fn bulk_export(&self, ids: &[LessonId], format: ExportFormat) -> EngineResult<Vec<u8>> {
        self.check_selection(ids)?;
        let _activity = self.inner.activity.start(Operation::ExportLessons);
        self.inner
            .api
            .bulk_export(ids, format)
            .await
            .map_err(EngineError::failed(Operation::ExportLessons))
    }
}
