//! Collaborator Layer - Core Traits
//!
//! Defines the abstract interfaces of the remote course store.
//! Implementations can be an HTTP client, in-memory, etc.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AssetKind, CourseId, DomainError, DomainResult, ExportFormat, Lesson, LessonDraft, LessonId,
    LessonPatch, MediaFile, Module, ModuleId, ModulePatch, PublishStatus,
};

/// Lesson CRUD and ordering
#[async_trait]
pub trait LessonApi: Send + Sync {
    /// List all lessons of a course
    async fn list_lessons(&self, course_id: &CourseId) -> DomainResult<Vec<Lesson>>;

    async fn create_lesson(&self, course_id: &CourseId, draft: &LessonDraft) -> DomainResult<Lesson>;

    async fn update_lesson(&self, id: &LessonId, patch: &LessonPatch) -> DomainResult<Lesson>;

    async fn delete_lesson(&self, id: &LessonId) -> DomainResult<()>;

    /// Persist a module's complete order. `ordered` always lists every
    /// member of the module, never just the moved pair.
    async fn reorder_lessons(
        &self,
        course_id: &CourseId,
        ordered: &[LessonId],
        module_id: Option<&ModuleId>,
    ) -> DomainResult<()>;
}

#[async_trait]
pub trait ModuleApi: Send + Sync {
    async fn list_modules(&self, course_id: &CourseId) -> DomainResult<Vec<Module>>;

    async fn update_module(&self, id: &ModuleId, patch: &ModulePatch) -> DomainResult<Module>;
}

/// Operations over many lessons in one request
#[async_trait]
pub trait BulkApi: Send + Sync {
    async fn bulk_update_status(&self, ids: &[LessonId], status: PublishStatus) -> DomainResult<BatchReport>;

    async fn bulk_delete(&self, ids: &[LessonId]) -> DomainResult<BatchReport>;

    /// Export payload in the requested format
    async fn bulk_export(&self, ids: &[LessonId], format: ExportFormat) -> DomainResult<Vec<u8>>;
}

#[async_trait]
pub trait UploadApi: Send + Sync {
    /// Upload a file and return its public URL
    async fn upload_asset(&self, course_id: &CourseId, kind: AssetKind, file: &MediaFile) -> DomainResult<String>;
}

/// Everything the dashboard needs from the remote store
pub trait CourseApi: LessonApi + ModuleApi + BulkApi + UploadApi {}

impl<T> CourseApi for T where T: LessonApi + ModuleApi + BulkApi + UploadApi {}

/// Result of one item inside a bulk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub id: LessonId,
    #[serde(default)]
    pub error: Option<DomainError>,
}

impl ItemOutcome {
    pub fn ok(id: LessonId) -> Self {
        Self { id, error: None }
    }

    pub fn failed(id: LessonId, error: DomainError) -> Self {
        Self { id, error: Some(error) }
    }
}

/// How a bulk request reported back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum BatchReport {
    /// Every item was applied
    Atomic,
    /// Items succeeded or failed individually
    PerItem(Vec<ItemOutcome>),
}
