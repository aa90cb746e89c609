//! In-memory course store
//!
//! Serves a single course from memory. Used by tests and offline sessions;
//! every call is recorded and failures can be injected per operation.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::{BatchReport, BulkApi, ItemOutcome, LessonApi, ModuleApi, UploadApi};
use crate::domain::{
    AssetKind, CourseId, DomainError, DomainResult, ExportFormat, Lesson, LessonDraft, LessonId,
    LessonPatch, MediaFile, Module, ModuleId, ModulePatch, PublishStatus,
};

/// Remote operation names, used for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    ListLessons,
    ListModules,
    CreateLesson,
    UpdateLesson,
    DeleteLesson,
    ReorderLessons,
    UpdateModule,
    BulkUpdateStatus,
    BulkDelete,
    BulkExport,
    UploadAsset,
}

/// A recorded call with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    ListLessons(CourseId),
    ListModules(CourseId),
    CreateLesson { course_id: CourseId, draft: LessonDraft },
    UpdateLesson { id: LessonId, patch: LessonPatch },
    DeleteLesson(LessonId),
    ReorderLessons {
        course_id: CourseId,
        ordered: Vec<LessonId>,
        module_id: Option<ModuleId>,
    },
    UpdateModule { id: ModuleId, patch: ModulePatch },
    BulkUpdateStatus { ids: Vec<LessonId>, status: PublishStatus },
    BulkDelete(Vec<LessonId>),
    BulkExport { ids: Vec<LessonId>, format: ExportFormat },
    UploadAsset { kind: AssetKind, file_name: String },
}

impl ApiCall {
    pub fn op(&self) -> ApiOp {
        match self {
            ApiCall::ListLessons(_) => ApiOp::ListLessons,
            ApiCall::ListModules(_) => ApiOp::ListModules,
            ApiCall::CreateLesson { .. } => ApiOp::CreateLesson,
            ApiCall::UpdateLesson { .. } => ApiOp::UpdateLesson,
            ApiCall::DeleteLesson(_) => ApiOp::DeleteLesson,
            ApiCall::ReorderLessons { .. } => ApiOp::ReorderLessons,
            ApiCall::UpdateModule { .. } => ApiOp::UpdateModule,
            ApiCall::BulkUpdateStatus { .. } => ApiOp::BulkUpdateStatus,
            ApiCall::BulkDelete(_) => ApiOp::BulkDelete,
            ApiCall::BulkExport { .. } => ApiOp::BulkExport,
            ApiCall::UploadAsset { .. } => ApiOp::UploadAsset,
        }
    }
}

/// How bulk endpoints report rejected items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkMode {
    /// One rejected item fails the whole request and nothing is applied
    #[default]
    Atomic,
    /// Accepted items are applied and each item gets its own outcome
    PerItem,
}

#[derive(Debug)]
struct Backend {
    course_id: CourseId,
    modules: Vec<Module>,
    lessons: Vec<Lesson>,
    calls: Vec<ApiCall>,
    failures: HashMap<ApiOp, VecDeque<DomainError>>,
    rejected: HashMap<LessonId, DomainError>,
    bulk_mode: BulkMode,
    next_id: u64,
    /// Latency of `list_lessons`, applied after the snapshot is taken
    list_delay: Option<Duration>,
}

impl Backend {
    fn record(&mut self, call: ApiCall) -> DomainResult<()> {
        let op = call.op();
        self.calls.push(call);
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => {
                log::debug!("[MemoryApi] Injected failure for {:?}: {}", op, error);
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn check_course(&self, course_id: &CourseId) -> DomainResult<()> {
        if *course_id == self.course_id {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("course {}", course_id)))
        }
    }

    fn check_module(&self, module_id: Option<&ModuleId>) -> DomainResult<()> {
        match module_id {
            Some(id) if !self.modules.iter().any(|m| m.id == *id) => {
                Err(DomainError::InvalidInput(format!("unknown module {}", id)))
            }
            _ => Ok(()),
        }
    }

    fn lesson_mut(&mut self, id: &LessonId) -> DomainResult<&mut Lesson> {
        self.lessons
            .iter_mut()
            .find(|l| l.id == *id)
            .ok_or_else(|| DomainError::NotFound(format!("lesson {}", id)))
    }

    fn next_position(&self, module_id: Option<&ModuleId>) -> i32 {
        self.lessons
            .iter()
            .filter(|l| l.module_id.as_ref() == module_id)
            .map(|l| l.position)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Object-id shaped: 8 hex digits of seconds, then a counter
    fn issue_id(&mut self) -> LessonId {
        self.next_id += 1;
        let secs = chrono::Utc::now().timestamp() as u32;
        LessonId::new(format!("{:08x}{:016x}", secs, self.next_id))
    }

    /// Why an item would be refused, if it would
    fn item_error(&self, id: &LessonId) -> Option<DomainError> {
        if let Some(error) = self.rejected.get(id) {
            return Some(error.clone());
        }
        if !self.lessons.iter().any(|l| l.id == *id) {
            return Some(DomainError::NotFound(format!("lesson {}", id)));
        }
        None
    }

    /// Run `apply` for each accepted item according to the bulk mode
    fn run_bulk(&mut self, ids: &[LessonId], mut apply: impl FnMut(&mut Self, &LessonId)) -> DomainResult<BatchReport> {
        match self.bulk_mode {
            BulkMode::Atomic => {
                if let Some(error) = ids.iter().find_map(|id| self.item_error(id)) {
                    return Err(error);
                }
                for id in ids {
                    apply(self, id);
                }
                Ok(BatchReport::Atomic)
            }
            BulkMode::PerItem => {
                let mut outcomes = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.item_error(id) {
                        Some(error) => outcomes.push(ItemOutcome::failed(id.clone(), error)),
                        None => {
                            apply(self, id);
                            outcomes.push(ItemOutcome::ok(id.clone()));
                        }
                    }
                }
                Ok(BatchReport::PerItem(outcomes))
            }
        }
    }
}

/// Single-course store kept entirely in memory
#[derive(Debug)]
pub struct InMemoryCourseApi {
    state: Mutex<Backend>,
}

impl InMemoryCourseApi {
    pub fn new(course_id: impl Into<CourseId>) -> Self {
        Self {
            state: Mutex::new(Backend {
                course_id: course_id.into(),
                modules: Vec::new(),
                lessons: Vec::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
                rejected: HashMap::new(),
                bulk_mode: BulkMode::default(),
                next_id: 0,
                list_delay: None,
            }),
        }
    }

    pub fn with_modules(mut self, modules: Vec<Module>) -> Self {
        self.state.get_mut().modules = modules;
        self
    }

    pub fn with_lessons(mut self, lessons: Vec<Lesson>) -> Self {
        self.state.get_mut().lessons = lessons;
        self
    }

    pub fn with_bulk_mode(mut self, mode: BulkMode) -> Self {
        self.state.get_mut().bulk_mode = mode;
        self
    }

    /// Make the next call of `op` fail with `error`. Queues up.
    pub async fn fail_next(&self, op: ApiOp, error: DomainError) {
        let mut state = self.state.lock().await;
        state.failures.entry(op).or_default().push_back(error);
    }

    /// Answer `list_lessons` with data read before waiting `delay`, like a
    /// slow network returning a response that is already out of date
    pub async fn delay_lesson_lists(&self, delay: Duration) {
        self.state.lock().await.list_delay = Some(delay);
    }

    /// Make bulk requests refuse `id`
    pub async fn reject_item(&self, id: impl Into<LessonId>, error: DomainError) {
        self.state.lock().await.rejected.insert(id.into(), error);
    }

    pub async fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, op: ApiOp) -> usize {
        self.state.lock().await.calls.iter().filter(|c| c.op() == op).count()
    }

    /// Server-side lessons, for asserting what was persisted
    pub async fn lessons(&self) -> Vec<Lesson> {
        self.state.lock().await.lessons.clone()
    }

    /// Change a lesson behind the session's back
    pub async fn edit_lesson(&self, id: &LessonId, edit: impl FnOnce(&mut Lesson)) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        edit(state.lesson_mut(id)?);
        Ok(())
    }
}

#[async_trait]
impl LessonApi for InMemoryCourseApi {
    async fn list_lessons(&self, course_id: &CourseId) -> DomainResult<Vec<Lesson>> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::ListLessons(course_id.clone()))?;
        state.check_course(course_id)?;
        let lessons = state.lessons.clone();
        let delay = state.list_delay;
        drop(state);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(lessons)
    }

    async fn create_lesson(&self, course_id: &CourseId, draft: &LessonDraft) -> DomainResult<Lesson> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::CreateLesson {
            course_id: course_id.clone(),
            draft: draft.clone(),
        })?;
        state.check_course(course_id)?;
        draft.validate()?;
        state.check_module(draft.module_id.as_ref())?;

        let id = state.issue_id();
        let position = state.next_position(draft.module_id.as_ref());
        let lesson = Lesson {
            status: draft.status,
            module_id: draft.module_id.clone(),
            position,
            duration_secs: draft.duration_secs,
            is_free: draft.is_free,
            description: draft.description.clone(),
            thumbnail_url: draft.thumbnail_url.clone(),
            video_url: draft.video_url.clone(),
            ..Lesson::new(id, draft.title.trim(), draft.kind)
        };
        state.lessons.push(lesson.clone());
        Ok(lesson)
    }

    async fn update_lesson(&self, id: &LessonId, patch: &LessonPatch) -> DomainResult<Lesson> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::UpdateLesson {
            id: id.clone(),
            patch: patch.clone(),
        })?;
        patch.validate()?;

        if let Some(target) = &patch.module {
            state.check_module(target.as_ref())?;
            let current = state.lesson_mut(id)?.module_id.clone();
            if current != *target {
                let position = state.next_position(target.as_ref());
                let lesson = state.lesson_mut(id)?;
                lesson.module_id = target.clone();
                lesson.position = position;
            }
        }

        let lesson = state.lesson_mut(id)?;
        patch.apply_fields(lesson);
        Ok(lesson.clone())
    }

    async fn delete_lesson(&self, id: &LessonId) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::DeleteLesson(id.clone()))?;
        let before = state.lessons.len();
        state.lessons.retain(|l| l.id != *id);
        if state.lessons.len() == before {
            return Err(DomainError::NotFound(format!("lesson {}", id)));
        }
        Ok(())
    }

    async fn reorder_lessons(
        &self,
        course_id: &CourseId,
        ordered: &[LessonId],
        module_id: Option<&ModuleId>,
    ) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::ReorderLessons {
            course_id: course_id.clone(),
            ordered: ordered.to_vec(),
            module_id: module_id.cloned(),
        })?;
        state.check_course(course_id)?;

        let mut members: Vec<&LessonId> = state
            .lessons
            .iter()
            .filter(|l| l.module_id.as_ref() == module_id)
            .map(|l| &l.id)
            .collect();
        members.sort();
        let mut requested: Vec<&LessonId> = ordered.iter().collect();
        requested.sort();
        if members != requested {
            return Err(DomainError::Conflict(
                "order does not list exactly the module's lessons".to_string(),
            ));
        }

        for (position, id) in ordered.iter().enumerate() {
            state.lesson_mut(id)?.position = position as i32;
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleApi for InMemoryCourseApi {
    async fn list_modules(&self, course_id: &CourseId) -> DomainResult<Vec<Module>> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::ListModules(course_id.clone()))?;
        state.check_course(course_id)?;
        Ok(state.modules.clone())
    }

    async fn update_module(&self, id: &ModuleId, patch: &ModulePatch) -> DomainResult<Module> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::UpdateModule {
            id: id.clone(),
            patch: patch.clone(),
        })?;
        patch.validate()?;
        let module = state
            .modules
            .iter_mut()
            .find(|m| m.id == *id)
            .ok_or_else(|| DomainError::NotFound(format!("module {}", id)))?;
        patch.apply_to(module);
        Ok(module.clone())
    }
}

#[async_trait]
impl BulkApi for InMemoryCourseApi {
    async fn bulk_update_status(&self, ids: &[LessonId], status: PublishStatus) -> DomainResult<BatchReport> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::BulkUpdateStatus {
            ids: ids.to_vec(),
            status,
        })?;
        state.run_bulk(ids, |backend, id| {
            if let Ok(lesson) = backend.lesson_mut(id) {
                lesson.status = status;
            }
        })
    }

    async fn bulk_delete(&self, ids: &[LessonId]) -> DomainResult<BatchReport> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::BulkDelete(ids.to_vec()))?;
        state.run_bulk(ids, |backend, id| backend.lessons.retain(|l| l.id != *id))
    }

    async fn bulk_export(&self, ids: &[LessonId], format: ExportFormat) -> DomainResult<Vec<u8>> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::BulkExport {
            ids: ids.to_vec(),
            format,
        })?;

        let mut selected = Vec::with_capacity(ids.len());
        for id in ids {
            selected.push(state.lesson_mut(id)?.clone());
        }

        match format {
            ExportFormat::Json => {
                serde_json::to_vec_pretty(&selected).map_err(|e| DomainError::Internal(e.to_string()))
            }
            ExportFormat::Csv => {
                let mut out = String::from("id,title,kind,status,module,position\n");
                for lesson in &selected {
                    out.push_str(&format!(
                        "{},{},{},{},{},{}\n",
                        lesson.id,
                        csv_field(&lesson.title),
                        lesson.kind.as_str(),
                        lesson.status.as_str(),
                        lesson.module_id.as_ref().map(ModuleId::as_str).unwrap_or(""),
                        lesson.position
                    ));
                }
                Ok(out.into_bytes())
            }
        }
    }
}

#[async_trait]
impl UploadApi for InMemoryCourseApi {
    async fn upload_asset(&self, course_id: &CourseId, kind: AssetKind, file: &MediaFile) -> DomainResult<String> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::UploadAsset {
            kind,
            file_name: file.file_name.clone(),
        })?;
        state.check_course(course_id)?;
        if file.bytes.is_empty() {
            return Err(DomainError::InvalidInput(format!("{} is empty", file.file_name)));
        }
        let folder = match kind {
            AssetKind::Thumbnail => "thumbnails",
            AssetKind::Video => "videos",
        };
        Ok(format!("memory://{}/{}/{}", course_id, folder, file.file_name))
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
