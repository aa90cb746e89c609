//! Lesson and module edits
//!
//! Create, update and delete are not optimistic: the store changes only
//! once the server has answered. Edits that add or remove module members
//! reserve the modules involved for their duration.

use super::engine::ReconcileEngine;
use super::error::{EngineError, EngineResult, Operation};
use crate::api::CourseApi;
use crate::domain::{
    AssetKind, CourseId, Lesson, LessonDraft, LessonId, LessonKind, LessonMedia, LessonPatch, MediaFile, Module,
    ModuleId, ModulePatch,
};

impl<A: CourseApi> ReconcileEngine<A> {
    /// Upload the media, then create the lesson. Validation runs before
    /// any request is made.
    pub async fn create_lesson(&self, mut draft: LessonDraft, media: LessonMedia) -> EngineResult<Lesson> {
        let course_id = self.course_id()?;
        draft.validate().map_err(EngineError::invalid)?;
        self.require_module(draft.module_id.as_ref())?;
        if draft.kind == LessonKind::Video && draft.video_url.is_none() && media.video.is_none() {
            return Err(EngineError::Validation("a video lesson needs a video".to_string()));
        }

        let _reservation = self.reserve_modules([draft.module_id.as_ref()])?;
        let _activity = self.inner.activity.start(Operation::CreateLesson);
        if let Some(file) = &media.thumbnail {
            draft.thumbnail_url = Some(self.upload(&course_id, AssetKind::Thumbnail, file).await?);
        }
        if let Some(file) = &media.video {
            draft.video_url = Some(self.upload(&course_id, AssetKind::Video, file).await?);
        }

        let lesson = self
            .inner
            .api
            .create_lesson(&course_id, &draft)
            .await
            .map_err(EngineError::failed(Operation::CreateLesson))?;

        log::info!("[Engine] Created lesson {} ({})", lesson.id, lesson.title);
        self.with_store(|s| s.insert_lesson(lesson.clone()));
        Ok(lesson)
    }

    async fn upload(&self, course_id: &CourseId, kind: AssetKind, file: &MediaFile) -> EngineResult<String> {
        let url = self
            .inner
            .api
            .upload_asset(course_id, kind, file)
            .await
            .map_err(EngineError::failed(Operation::UploadMedia))?;
        log::debug!("[Engine] Uploaded {} as {}", file.file_name, url);
        Ok(url)
    }

    pub async fn update_lesson(&self, id: &LessonId, patch: LessonPatch) -> EngineResult<Lesson> {
        patch.validate().map_err(EngineError::invalid)?;
        self.require_lessons(std::slice::from_ref(id))?;
        if let Some(target) = &patch.module {
            self.require_module(target.as_ref())?;
        }

        let in_flight = self
            .inner
            .in_flight
            .claim(std::slice::from_ref(id), Operation::UpdateLesson)
            .map_err(EngineError::Busy)?;
        let reservation = match &patch.module {
            Some(target) => {
                let from = self
                    .with_store(|s| s.lesson(id).map(|l| l.module_id.clone()))
                    .ok_or_else(|| EngineError::UnknownLesson(id.clone()))?;
                Some(self.reserve_modules([from.as_ref(), target.as_ref()])?)
            }
            None => None,
        };
        let activity = self.inner.activity.start(Operation::UpdateLesson);

        let updated = self
            .inner
            .api
            .update_lesson(id, &patch)
            .await
            .map_err(EngineError::failed(Operation::UpdateLesson))?;

        self.with_store(|s| {
            if let Some(target) = &patch.module {
                s.move_to_module(id, target.as_ref());
            }
            s.merge_server_fields(updated.clone());
            s.confirm_lesson(id);
        });
        drop(reservation);
        drop(in_flight);
        drop(activity);

        if patch.changes_module() {
            self.refresh_if_idle().await;
        }
        Ok(updated)
    }

    /// Delete a lesson. The remaining lessons keep their positions.
    pub async fn delete_lesson(&self, id: &LessonId) -> EngineResult<()> {
        self.require_lessons(std::slice::from_ref(id))?;
        let _in_flight = self
            .inner
            .in_flight
            .claim(std::slice::from_ref(id), Operation::DeleteLesson)
            .map_err(EngineError::Busy)?;
        let module_id = self.with_store(|s| s.lesson(id).and_then(|l| l.module_id.clone()));
        let _reservation = self.reserve_modules([module_id.as_ref()])?;
        let _activity = self.inner.activity.start(Operation::DeleteLesson);

        self.inner
            .api
            .delete_lesson(id)
            .await
            .map_err(EngineError::failed(Operation::DeleteLesson))?;

        self.with_store(|s| s.remove_lesson(id));
        log::info!("[Engine] Deleted lesson {}", id);
        Ok(())
    }

    pub async fn update_module(&self, id: &ModuleId, patch: ModulePatch) -> EngineResult<Module> {
        patch.validate().map_err(EngineError::invalid)?;
        self.require_module(Some(id))?;
        let _activity = self.inner.activity.start(Operation::UpdateModule);

        let module = self
            .inner
            .api
            .update_module(id, &patch)
            .await
            .map_err(EngineError::failed(Operation::UpdateModule))?;

        self.with_store(|s| s.upsert_module(module.clone()));
        Ok(module)
    }
}
