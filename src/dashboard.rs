//! Dashboard session
//!
//! One open course: the ordering store behind the engine, the projection the
//! list renders from, the drag machine, and the bulk selection. A UI shell
//! forwards pointer, keyboard and toolbar events here.

use std::sync::Arc;

use dragdrop::{DragMachine, DropTarget, HoverChange, PressTracker};

use crate::api::CourseApi;
use crate::config::DashboardConfig;
use crate::domain::{CourseId, ExportFormat, LessonId, ModuleId, PublishStatus};
use crate::reconcile::{
    ActivitySnapshot, BatchResult, EngineError, EngineResult, MoveOutcome, PendingMove, ReconcileEngine,
};
use crate::selection::Selection;
use crate::store::{lock, OrderingStore};
use crate::view::{LessonView, ProjectionCache, ViewFilter};

/// Drop zone on the lesson list
pub type Zone = DropTarget<LessonId, ModuleId>;

pub struct Dashboard<A> {
    engine: ReconcileEngine<A>,
    config: DashboardConfig,
    filter: ViewFilter,
    projection: ProjectionCache,
    drag: DragMachine<LessonId, ModuleId>,
    press: PressTracker<LessonId>,
    selection: Selection,
}

impl<A: CourseApi> Dashboard<A> {
    pub fn new(api: Arc<A>, config: DashboardConfig) -> Self {
        let engine = ReconcileEngine::new(api, OrderingStore::new().into_shared(), config.engine_options());
        Self {
            engine,
            filter: ViewFilter::sorted_by(config.default_sort),
            projection: ProjectionCache::new(),
            drag: DragMachine::new(),
            press: PressTracker::new(config.drag_threshold_px),
            selection: Selection::new(),
            config,
        }
    }

    pub fn engine(&self) -> &ReconcileEngine<A> {
        &self.engine
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn activity(&self) -> ActivitySnapshot {
        self.engine.activity()
    }

    /// Load a course, dropping any drag or selection of the previous one
    pub async fn open_course(&mut self, course_id: CourseId) -> EngineResult<()> {
        self.drag.reset();
        self.press.release();
        self.selection.clear();
        self.engine.load(course_id).await
    }

    pub async fn refresh(&mut self) -> EngineResult<()> {
        self.engine.refresh().await?;
        self.prune_selection();
        Ok(())
    }

    // ========================
    // View
    // ========================

    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    /// Replace the filter; selected lessons it hides are deselected
    pub fn set_filter(&mut self, filter: ViewFilter) {
        self.filter = filter;
        self.prune_selection();
    }

    pub fn view(&mut self) -> &LessonView {
        let store = lock(self.engine.store());
        self.projection.view(&store, &self.filter)
    }

    pub fn visible_ids(&mut self) -> Vec<LessonId> {
        self.view().lesson_ids.clone()
    }

    fn prune_selection(&mut self) {
        let visible = self.visible_ids();
        let dropped = self.selection.retain_visible(&visible);
        if dropped > 0 {
            log::debug!("[Dashboard] {} selected lessons hidden by the filter", dropped);
        }
    }

    // ========================
    // Drag and drop
    // ========================

    /// Pointer down on a lesson row
    pub fn press(&mut self, lesson: LessonId, x: i32, y: i32) {
        self.press.press(lesson, x, y);
    }

    /// Pointer moved; starts the drag once past the threshold.
    /// Returns true when a drag started.
    pub fn pointer_moved(&mut self, x: i32, y: i32) -> EngineResult<bool> {
        match self.press.moved(x, y) {
            Some(lesson) => self.begin_drag(lesson).map(|_| true),
            None => Ok(false),
        }
    }

    /// Pointer up without a drag (a click)
    pub fn release(&mut self) {
        self.press.release();
    }

    pub fn begin_drag(&mut self, lesson: LessonId) -> EngineResult<()> {
        if self.engine.is_busy(&lesson) {
            return Err(EngineError::Busy(lesson));
        }
        let origin = self
            .engine
            .with_store(|s| s.lesson(&lesson).map(|l| l.module_id.clone()))
            .ok_or_else(|| EngineError::UnknownLesson(lesson.clone()))?;
        self.drag.begin(lesson, origin)?;
        Ok(())
    }

    pub fn dragged(&self) -> Option<&LessonId> {
        self.drag.dragged()
    }

    pub fn hover_target(&self) -> Option<&Zone> {
        self.drag.hover_target()
    }

    pub fn hover(&mut self, zone: Zone) -> HoverChange {
        self.drag.enter(zone)
    }

    pub fn leave(&mut self, zone: &Zone) -> HoverChange {
        self.drag.leave(zone)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
        self.press.release();
    }

    /// Drop the dragged lesson. The move is applied locally; confirm the
    /// returned pending move to persist it.
    pub fn drop_dragged(&mut self) -> EngineResult<Option<PendingMove>> {
        self.press.release();
        match self.drag.drop_item() {
            Some(intent) => self.engine.submit(intent.into()),
            None => Ok(None),
        }
    }

    pub async fn drop_and_confirm(&mut self) -> EngineResult<Option<MoveOutcome>> {
        match self.drop_dragged()? {
            Some(pending) => self.engine.confirm(pending).await.map(Some),
            None => Ok(None),
        }
    }

    /// Keyboard reorder within the lesson's module
    pub async fn shift_lesson(&mut self, lesson: &LessonId, offset: i32) -> EngineResult<Option<MoveOutcome>> {
        match self.engine.submit_shift(lesson, offset)? {
            Some(pending) => self.engine.confirm(pending).await.map(Some),
            None => Ok(None),
        }
    }

    // ========================
    // Selection and batch operations
    // ========================

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn toggle_selected(&mut self, lesson: &LessonId) -> bool {
        let visible = self.visible_ids();
        self.selection.toggle(lesson, &visible)
    }

    pub fn select_all_visible(&mut self) {
        let visible = self.visible_ids();
        self.selection.select_all(&visible);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn selected_ids(&mut self) -> Vec<LessonId> {
        let visible = self.visible_ids();
        self.selection.ordered(&visible)
    }

    pub async fn set_selected_status(&mut self, status: PublishStatus) -> EngineResult<BatchResult> {
        let ids = self.selected_ids();
        let result = self.engine.bulk_set_status(&ids, status).await?;
        self.settle_selection(&result);
        Ok(result)
    }

    pub async fn toggle_selected_status(&mut self) -> EngineResult<BatchResult> {
        let ids = self.selected_ids();
        let result = self.engine.bulk_toggle_status(&ids).await?;
        self.settle_selection(&result);
        Ok(result)
    }

    pub async fn delete_selected(&mut self) -> EngineResult<BatchResult> {
        let ids = self.selected_ids();
        let result = self.engine.bulk_delete(&ids).await?;
        self.settle_selection(&result);
        Ok(result)
    }

    /// Export the selection; uses the configured format unless one is given
    pub async fn export_selected(&mut self, format: Option<ExportFormat>) -> EngineResult<Vec<u8>> {
        let ids = self.selected_ids();
        let format = format.unwrap_or(self.config.export_format);
        let bytes = self.engine.bulk_export(&ids, format).await?;
        self.selection.clear();
        Ok(bytes)
    }

    fn settle_selection(&mut self, result: &BatchResult) {
        self.selection.apply_result(result);
        if let Some(summary) = result.failure_summary() {
            log::warn!("[Dashboard] {}", summary);
        }
        self.prune_selection();
    }
}
