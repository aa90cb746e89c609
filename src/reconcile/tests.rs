//! Reconciliation Integration Tests
//!
//! Drives the engine against the in-memory course store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::api::{ApiCall, ApiOp, BulkMode, InMemoryCourseApi};
    use crate::domain::{
        CourseId, DomainError, ExportFormat, Lesson, LessonDraft, LessonId, LessonKind, LessonMedia, LessonPatch,
        MediaFile, Module, ModuleId, PublishStatus,
    };
    use crate::reconcile::{
        ActivityClass, EngineError, EngineOptions, MoveIntent, MoveOutcome, MoveRequest, Operation, ReconcileEngine,
    };
    use crate::store::OrderingStore;

    type Engine = ReconcileEngine<InMemoryCourseApi>;

    const COURSE: &str = "c1";

    fn ids(raw: &[&str]) -> Vec<LessonId> {
        raw.iter().map(|s| LessonId::from(*s)).collect()
    }

    fn lesson(id: &str) -> LessonId {
        LessonId::from(id)
    }

    fn intro() -> ModuleId {
        ModuleId::from("intro")
    }

    fn advanced() -> ModuleId {
        ModuleId::from("advanced")
    }

    /// Intro [L1, L2, L3], Advanced [A1], plus `extra`
    fn course_api(extra: Vec<Lesson>) -> InMemoryCourseApi {
        let mut lessons = vec![
            Lesson::in_module("L1", "Welcome", LessonKind::Video, "intro", 0),
            Lesson::in_module("L2", "Setup", LessonKind::Text, "intro", 1),
            Lesson::in_module("L3", "First quiz", LessonKind::Quiz, "intro", 2),
            Lesson::in_module("A1", "Deep dive", LessonKind::Video, "advanced", 0),
        ];
        lessons.extend(extra);
        InMemoryCourseApi::new(COURSE)
            .with_modules(vec![Module::new("intro", "Intro"), Module::new("advanced", "Advanced")])
            .with_lessons(lessons)
    }

    async fn setup(api: InMemoryCourseApi) -> (Arc<InMemoryCourseApi>, Engine) {
        setup_with(api, false).await
    }

    async fn setup_with(api: InMemoryCourseApi, refresh_after_mutation: bool) -> (Arc<InMemoryCourseApi>, Engine) {
        let api = Arc::new(api);
        let engine = ReconcileEngine::new(
            Arc::clone(&api),
            OrderingStore::new().into_shared(),
            EngineOptions { refresh_after_mutation },
        );
        engine.load(CourseId::from(COURSE)).await.expect("Failed to load course");
        (api, engine)
    }

    fn members(engine: &Engine, module: Option<&ModuleId>) -> Vec<LessonId> {
        engine.with_store(|s| s.member_ids(module))
    }

    fn reorder_calls(calls: &[ApiCall]) -> Vec<Vec<LessonId>> {
        calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::ReorderLessons { ordered, .. } => Some(ordered.clone()),
                _ => None,
            })
            .collect()
    }

    fn reorder(moved: &str, target: &str) -> MoveIntent {
        MoveIntent::Reorder {
            lesson: lesson(moved),
            target: lesson(target),
        }
    }

    fn reassign(moved: &str, module_id: Option<ModuleId>) -> MoveIntent {
        MoveIntent::Reassign {
            lesson: lesson(moved),
            module_id,
        }
    }

    // ========================
    // Reorder
    // ========================

    #[tokio::test]
    async fn test_drag_l3_onto_l1_sends_complete_order() {
        let (api, engine) = setup(course_api(vec![])).await;

        let outcome = engine.apply(reorder("L3", "L1")).await.expect("Reorder failed");
        assert_eq!(
            outcome,
            Some(MoveOutcome::Reordered {
                module_id: Some(intro()),
                ordered: ids(&["L3", "L1", "L2"]),
            })
        );

        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1", "L2"]));
        assert!(engine.with_store(|s| s.positions_are_dense(Some(&intro()))));

        let calls = api.calls().await;
        assert!(calls.contains(&ApiCall::ReorderLessons {
            course_id: CourseId::from(COURSE),
            ordered: ids(&["L3", "L1", "L2"]),
            module_id: Some(intro()),
        }));
        assert_eq!(api.call_count(ApiOp::ReorderLessons).await, 1);
    }

    #[tokio::test]
    async fn test_reorder_is_applied_before_confirmation() {
        let (api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1", "L2"]));
        assert!(!engine.with_store(|s| s.is_confirmed(&lesson("L3"))));
        assert_eq!(api.call_count(ApiOp::ReorderLessons).await, 0);

        engine.confirm(pending).await.unwrap();
        assert!(engine.with_store(|s| s.is_confirmed(&lesson("L3"))));
    }

    #[tokio::test]
    async fn test_failed_reorder_rolls_back_to_original_position() {
        let (api, engine) = setup(course_api(vec![])).await;
        api.fail_next(ApiOp::ReorderLessons, DomainError::Unavailable("timeout".into()))
            .await;

        let pending = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        assert_eq!(engine.with_store(|s| s.lesson(&lesson("L3")).unwrap().position), 0);

        let err = engine.confirm(pending).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Failed {
                operation: Operation::ReorderLessons,
                ..
            }
        ));
        assert!(err.to_string().starts_with("Could not save the new lesson order"));

        let l3 = engine.with_store(|s| s.lesson(&lesson("L3")).cloned().unwrap());
        assert_eq!(l3.module_id, Some(intro()));
        assert_eq!(l3.position, 2);
        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L2", "L3"]));
        assert!(!engine.is_busy(&lesson("L3")));
    }

    #[tokio::test]
    async fn test_lesson_in_flight_cannot_move_again() {
        let (_api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        assert!(engine.is_busy(&lesson("L3")));
        assert_eq!(engine.pending_operation(&lesson("L3")), Some(Operation::ReorderLessons));

        let err = engine.submit(reorder("L3", "L2")).unwrap_err();
        assert!(matches!(err, EngineError::Busy(ref id) if *id == lesson("L3")));

        engine.confirm(pending).await.unwrap();
        assert!(!engine.is_busy(&lesson("L3")));
    }

    #[tokio::test]
    async fn test_self_drop_and_same_module_are_noops() {
        let (api, engine) = setup(course_api(vec![])).await;
        let revision = engine.with_store(|s| s.revision());

        assert!(engine.submit(reorder("L1", "L1")).unwrap().is_none());
        let same_module = MoveIntent::Reassign {
            lesson: lesson("L1"),
            module_id: Some(intro()),
        };
        assert!(engine.submit(same_module).unwrap().is_none());

        assert_eq!(engine.with_store(|s| s.revision()), revision);
        assert_eq!(api.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reorders_are_sent_in_issue_order() {
        let (api, engine) = setup(course_api(vec![])).await;

        let first = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        let second = engine.submit(reorder("L2", "L3")).unwrap().unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L2", "L3", "L1"]));

        // Poll the later move first; it must still go out second
        let (second, first) = tokio::join!(engine.confirm(second), engine.confirm(first));
        first.unwrap();
        second.unwrap();

        assert_eq!(
            reorder_calls(&api.calls().await),
            vec![ids(&["L3", "L1", "L2"]), ids(&["L2", "L3", "L1"])]
        );
        assert_eq!(members(&engine, Some(&intro())), ids(&["L2", "L3", "L1"]));

        let server = api.lessons().await;
        let position = |id: &str| server.iter().find(|l| l.id.as_str() == id).unwrap().position;
        assert_eq!((position("L2"), position("L3"), position("L1")), (0, 1, 2));
    }

    #[tokio::test]
    async fn test_failure_supersedes_queued_reorders() {
        let (api, engine) = setup(course_api(vec![])).await;
        api.fail_next(ApiOp::ReorderLessons, DomainError::Unavailable("timeout".into()))
            .await;

        let first = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        let second = engine.submit(reorder("L2", "L3")).unwrap().unwrap();

        assert!(engine.confirm(first).await.is_err());
        let err = engine.confirm(second).await.unwrap_err();
        assert!(matches!(err, EngineError::Superseded { .. }));
        assert!(err.is_retryable());

        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L2", "L3"]));
        assert_eq!(api.call_count(ApiOp::ReorderLessons).await, 1);

        // The queue recovers for new moves
        engine.apply(reorder("L3", "L1")).await.unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1", "L2"]));
    }

    #[tokio::test]
    async fn test_dropped_pending_move_reverts() {
        let (api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        drop(pending);

        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L2", "L3"]));
        assert!(!engine.is_busy(&lesson("L3")));
        assert_eq!(api.call_count(ApiOp::ReorderLessons).await, 0);

        engine.apply(reorder("L2", "L1")).await.unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L2", "L1", "L3"]));
    }

    #[tokio::test]
    async fn test_keyboard_shift_clamps_to_module_ends() {
        let (_api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit_shift(&lesson("L1"), 1).unwrap().unwrap();
        engine.confirm(pending).await.unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L2", "L1", "L3"]));

        assert!(engine.submit_shift(&lesson("L2"), -5).unwrap().is_none());
        let pending = engine.submit_shift(&lesson("L2"), 10).unwrap().unwrap();
        engine.confirm(pending).await.unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L3", "L2"]));
    }

    // ========================
    // Reassign
    // ========================

    #[tokio::test]
    async fn test_l4_dragged_onto_advanced_header() {
        let l4 = Lesson::in_module("L4", "Wrap up", LessonKind::Text, "intro", 3);
        let (api, engine) = setup(course_api(vec![l4])).await;

        let intent = MoveIntent::Reassign {
            lesson: lesson("L4"),
            module_id: Some(advanced()),
        };
        let pending = engine.submit(intent).unwrap().unwrap();
        // Not applied until the server accepts it
        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L2", "L3", "L4"]));

        let outcome = engine.confirm(pending).await.unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Reassigned {
                lesson: lesson("L4"),
                from: Some(intro()),
                to: Some(advanced()),
            }
        );

        let updates: Vec<ApiCall> = api
            .calls()
            .await
            .into_iter()
            .filter(|c| c.op() == ApiOp::UpdateLesson)
            .collect();
        assert_eq!(
            updates,
            vec![ApiCall::UpdateLesson {
                id: lesson("L4"),
                patch: LessonPatch::module(Some(advanced())),
            }]
        );

        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L2", "L3"]));
        assert_eq!(members(&engine, Some(&advanced())), ids(&["A1", "L4"]));
        assert!(engine.with_store(|s| s.positions_are_dense(Some(&advanced()))));
        assert!(engine.with_store(|s| s.is_confirmed(&lesson("L4"))));
    }

    #[tokio::test]
    async fn test_row_drop_across_modules_becomes_reassign() {
        let (_api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit(reorder("L1", "A1")).unwrap().unwrap();
        assert_eq!(pending.operation(), Operation::MoveLesson);
        assert_eq!(
            pending.request(),
            MoveRequest::Reassign {
                lesson: lesson("L1"),
                from: Some(intro()),
                to: Some(advanced()),
            }
        );
        engine.confirm(pending).await.unwrap();
        assert_eq!(members(&engine, Some(&advanced())), ids(&["A1", "L1"]));
    }

    #[tokio::test]
    async fn test_reassign_to_ungrouped() {
        let (_api, engine) = setup(course_api(vec![])).await;

        let intent = MoveIntent::Reassign {
            lesson: lesson("L2"),
            module_id: None,
        };
        engine.apply(intent).await.unwrap();
        assert_eq!(members(&engine, None), ids(&["L2"]));
        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L3"]));
    }

    #[tokio::test]
    async fn test_failed_reassign_leaves_store_untouched() {
        let (api, engine) = setup(course_api(vec![])).await;
        api.fail_next(ApiOp::UpdateLesson, DomainError::Conflict("locked".into()))
            .await;

        let intent = MoveIntent::Reassign {
            lesson: lesson("L3"),
            module_id: Some(advanced()),
        };
        let err = engine.apply(intent).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::MoveLesson));

        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L2", "L3"]));
        assert_eq!(members(&engine, Some(&advanced())), ids(&["A1"]));
    }

    #[tokio::test]
    async fn test_reassign_to_unknown_module_is_rejected() {
        let (_api, engine) = setup(course_api(vec![])).await;
        let intent = MoveIntent::Reassign {
            lesson: lesson("L1"),
            module_id: Some(ModuleId::from("missing")),
        };
        assert!(matches!(engine.submit(intent), Err(EngineError::UnknownModule(_))));
    }

    // ========================
    // Load and refresh
    // ========================

    #[tokio::test]
    async fn test_reassign_refused_while_module_has_queued_reorder() {
        let (api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        let err = engine.apply(reassign("L2", Some(advanced()))).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleBusy(Some(ref m)) if *m == intro()));
        assert!(!engine.is_busy(&lesson("L2")));
        assert_eq!(api.call_count(ApiOp::UpdateLesson).await, 0);

        // The queued reorder still lists every member the server knows
        engine.confirm(pending).await.unwrap();
        assert_eq!(reorder_calls(&api.calls().await), vec![ids(&["L3", "L1", "L2"])]);

        engine.apply(reassign("L2", Some(advanced()))).await.unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1"]));
        assert_eq!(members(&engine, Some(&advanced())), ids(&["A1", "L2"]));
        assert!(engine.with_store(|s| s.positions_are_dense(Some(&intro()))));
    }

    #[tokio::test]
    async fn test_reorder_refused_while_member_moves_out() {
        let (api, engine) = setup(course_api(vec![])).await;

        let moving = engine.submit(reassign("L2", Some(advanced()))).unwrap().unwrap();
        let err = engine.submit(reorder("L3", "L1")).unwrap_err();
        assert!(matches!(err, EngineError::ModuleBusy(Some(ref m)) if *m == intro()));
        assert!(err.is_retryable());
        assert!(!engine.is_busy(&lesson("L3")));
        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L2", "L3"]));

        engine.confirm(moving).await.unwrap();
        engine.apply(reorder("L3", "L1")).await.unwrap();
        assert_eq!(reorder_calls(&api.calls().await), vec![ids(&["L3", "L1"])]);
        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1"]));
    }

    #[tokio::test]
    async fn test_delete_refused_while_module_has_queued_reorder() {
        let (api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        let err = engine.delete_lesson(&lesson("L2")).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleBusy(Some(_))));
        let err = engine.bulk_delete(&ids(&["L2", "A1"])).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleBusy(Some(_))));
        assert_eq!(api.call_count(ApiOp::DeleteLesson).await, 0);
        assert_eq!(api.call_count(ApiOp::BulkDelete).await, 0);
        assert!(!engine.is_busy(&lesson("A1")));

        engine.confirm(pending).await.unwrap();
        engine.delete_lesson(&lesson("L2")).await.unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1"]));
    }

    #[tokio::test]
    async fn test_moves_need_an_open_course() {
        let api = Arc::new(course_api(vec![]));
        let engine = ReconcileEngine::new(api, OrderingStore::new().into_shared(), EngineOptions::default());
        assert!(matches!(engine.submit(reorder("L3", "L1")), Err(EngineError::NoCourse)));
    }

    #[tokio::test]
    async fn test_load_failure_names_operation() {
        let api = Arc::new(course_api(vec![]));
        api.fail_next(ApiOp::ListLessons, DomainError::Unavailable("down".into()))
            .await;
        let engine = ReconcileEngine::new(Arc::clone(&api), OrderingStore::new().into_shared(), EngineOptions::default());

        let err = engine.load(CourseId::from(COURSE)).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::LoadCourse));
        assert!(matches!(engine.course_id(), Err(EngineError::NoCourse)));
    }

    #[tokio::test]
    async fn test_refresh_after_mutation_picks_up_server_changes() {
        let (api, engine) = setup_with(course_api(vec![]), true).await;
        api.edit_lesson(&lesson("L2"), |l| l.title = "Setup (updated)".to_string())
            .await
            .unwrap();

        engine.apply(reorder("L3", "L1")).await.unwrap();

        assert_eq!(api.call_count(ApiOp::ListLessons).await, 2);
        let title = engine.with_store(|s| s.lesson(&lesson("L2")).unwrap().title.clone());
        assert_eq!(title, "Setup (updated)");
        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1", "L2"]));
    }

    #[tokio::test]
    async fn test_refresh_waits_until_idle() {
        let (api, engine) = setup_with(course_api(vec![]), true).await;

        let first = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        let second = engine.submit(reorder("L1", "L2")).unwrap().unwrap();
        engine.confirm(first).await.unwrap();
        assert_eq!(api.call_count(ApiOp::ListLessons).await, 1);

        engine.confirm(second).await.unwrap();
        assert_eq!(api.call_count(ApiOp::ListLessons).await, 2);
    }

    #[tokio::test]
    async fn test_slow_refresh_does_not_undo_a_later_move() {
        let (api, engine) = setup(course_api(vec![])).await;
        api.delay_lesson_lists(Duration::from_millis(50)).await;

        // The fetch reads the old order, then the move lands before it returns
        let (refreshed, moved) = tokio::join!(engine.refresh(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.apply(reorder("L3", "L1")).await
        });
        moved.unwrap();
        assert!(!refreshed.unwrap());
        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1", "L2"]));

        // A fetch started after the move is applied
        assert!(engine.refresh().await.unwrap());
        assert_eq!(members(&engine, Some(&intro())), ids(&["L3", "L1", "L2"]));
        assert!(engine.with_store(|s| s.is_confirmed(&lesson("L3"))));
    }

    #[tokio::test]
    async fn test_activity_is_tracked_per_class() {
        let (_api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        let activity = engine.activity();
        assert!(activity.is_active(ActivityClass::Reorder));
        assert!(!activity.is_active(ActivityClass::Update));

        engine.confirm(pending).await.unwrap();
        assert!(engine.activity().is_idle());
    }

    // ========================
    // Lesson edits
    // ========================

    #[tokio::test]
    async fn test_create_validation_makes_no_request() {
        let (api, engine) = setup(course_api(vec![])).await;

        let blank = LessonDraft::new("   ", LessonKind::Text);
        assert!(matches!(
            engine.create_lesson(blank, LessonMedia::default()).await,
            Err(EngineError::Validation(_))
        ));

        let video_without_file = LessonDraft::new("Intro video", LessonKind::Video);
        assert!(matches!(
            engine.create_lesson(video_without_file, LessonMedia::default()).await,
            Err(EngineError::Validation(_))
        ));

        assert_eq!(api.call_count(ApiOp::CreateLesson).await, 0);
        assert_eq!(api.call_count(ApiOp::UploadAsset).await, 0);
    }

    #[tokio::test]
    async fn test_create_uploads_media_first() {
        let (api, engine) = setup(course_api(vec![])).await;

        let media = LessonMedia {
            thumbnail: Some(MediaFile::new("cover.png", "image/png", vec![1, 2, 3])),
            video: Some(MediaFile::new("intro.mp4", "video/mp4", vec![4, 5, 6])),
        };
        let draft = LessonDraft::new("Recap", LessonKind::Video).in_module("intro");
        let created = engine.create_lesson(draft, media).await.expect("Create failed");

        assert_eq!(created.video_url.as_deref(), Some("memory://c1/videos/intro.mp4"));
        assert_eq!(created.thumbnail_url.as_deref(), Some("memory://c1/thumbnails/cover.png"));
        assert_eq!(created.position, 3);

        let ops: Vec<ApiOp> = api.calls().await.iter().skip(2).map(ApiCall::op).collect();
        assert_eq!(ops, vec![ApiOp::UploadAsset, ApiOp::UploadAsset, ApiOp::CreateLesson]);
        assert_eq!(members(&engine, Some(&intro())).last(), Some(&created.id));
    }

    #[tokio::test]
    async fn test_failed_upload_aborts_create() {
        let (api, engine) = setup(course_api(vec![])).await;
        api.fail_next(ApiOp::UploadAsset, DomainError::Unavailable("storage".into()))
            .await;

        let media = LessonMedia {
            video: Some(MediaFile::new("intro.mp4", "video/mp4", vec![1])),
            ..Default::default()
        };
        let err = engine
            .create_lesson(LessonDraft::new("Recap", LessonKind::Video), media)
            .await
            .unwrap_err();
        assert_eq!(err.operation(), Some(Operation::UploadMedia));
        assert_eq!(api.call_count(ApiOp::CreateLesson).await, 0);
    }

    #[tokio::test]
    async fn test_update_lesson_fields() {
        let (_api, engine) = setup(course_api(vec![])).await;

        let patch = LessonPatch {
            title: Some("Getting started".to_string()),
            is_free: Some(true),
            ..Default::default()
        };
        let updated = engine.update_lesson(&lesson("L1"), patch).await.unwrap();
        assert_eq!(updated.title, "Getting started");

        let stored = engine.with_store(|s| s.lesson(&lesson("L1")).cloned().unwrap());
        assert!(stored.is_free);
        assert_eq!(stored.position, 0);
    }

    #[tokio::test]
    async fn test_delete_keeps_remaining_positions() {
        let (_api, engine) = setup(course_api(vec![])).await;

        engine.delete_lesson(&lesson("L2")).await.unwrap();
        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L3"]));
        assert_eq!(engine.with_store(|s| s.lesson(&lesson("L3")).unwrap().position), 2);
    }

    #[tokio::test]
    async fn test_update_module_title() {
        let (_api, engine) = setup(course_api(vec![])).await;
        let patch = crate::domain::ModulePatch {
            title: Some("Getting Started".to_string()),
            ..Default::default()
        };
        engine.update_module(&intro(), patch).await.unwrap();
        let title = engine.with_store(|s| s.module(&intro()).unwrap().title.clone());
        assert_eq!(title, "Getting Started");
    }

    // ========================
    // Bulk
    // ========================

    #[tokio::test]
    async fn test_bulk_status_partial_failure() {
        let api = course_api(vec![]).with_bulk_mode(BulkMode::PerItem);
        api.reject_item("L2", DomainError::Conflict("locked".into())).await;
        let (_api, engine) = setup(api).await;

        let result = engine
            .bulk_set_status(&ids(&["L1", "L2"]), PublishStatus::Published)
            .await
            .unwrap();
        assert_eq!(result.succeeded, ids(&["L1"]));
        assert_eq!(result.failed_ids(), ids(&["L2"]));

        let status = |id: &str| engine.with_store(|s| s.lesson(&lesson(id)).unwrap().status);
        assert_eq!(status("L1"), PublishStatus::Published);
        assert_eq!(status("L2"), PublishStatus::Draft);
    }

    #[tokio::test]
    async fn test_bulk_atomic_failure_restores_everything() {
        let api = course_api(vec![]);
        api.reject_item("L2", DomainError::Conflict("locked".into())).await;
        let (_api, engine) = setup(api).await;

        let err = engine.bulk_delete(&ids(&["L1", "L2"])).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::DeleteLessons));

        let order: Vec<LessonId> = engine.with_store(|s| s.lessons().iter().map(|l| l.id.clone()).collect());
        assert_eq!(order, ids(&["L1", "L2", "L3", "A1"]));
        assert!(engine.with_store(|s| s.is_confirmed(&lesson("L1"))));
    }

    #[tokio::test]
    async fn test_bulk_delete_partial_failure_restores_rejected() {
        let api = course_api(vec![]).with_bulk_mode(BulkMode::PerItem);
        api.reject_item("L1", DomainError::Conflict("locked".into())).await;
        let (_api, engine) = setup(api).await;

        let result = engine.bulk_delete(&ids(&["L1", "L3"])).await.unwrap();
        assert_eq!(result.succeeded, ids(&["L3"]));
        assert_eq!(members(&engine, Some(&intro())), ids(&["L1", "L2"]));
    }

    #[tokio::test]
    async fn test_bulk_toggle_publishes_when_any_draft() {
        let mut published = Lesson::in_module("P1", "Published", LessonKind::Text, "advanced", 1);
        published.status = PublishStatus::Published;
        let (_api, engine) = setup(course_api(vec![published])).await;

        let selection = ids(&["L1", "P1"]);
        engine.bulk_toggle_status(&selection).await.unwrap();
        let status = |id: &str| engine.with_store(|s| s.lesson(&lesson(id)).unwrap().status);
        assert_eq!((status("L1"), status("P1")), (PublishStatus::Published, PublishStatus::Published));

        engine.bulk_toggle_status(&selection).await.unwrap();
        assert_eq!((status("L1"), status("P1")), (PublishStatus::Draft, PublishStatus::Draft));
    }

    #[tokio::test]
    async fn test_bulk_refuses_lessons_in_flight() {
        let (api, engine) = setup(course_api(vec![])).await;

        let pending = engine.submit(reorder("L3", "L1")).unwrap().unwrap();
        let err = engine.bulk_delete(&ids(&["L1", "L3"])).await.unwrap_err();
        assert!(matches!(err, EngineError::Busy(ref id) if *id == lesson("L3")));
        assert_eq!(api.call_count(ApiOp::BulkDelete).await, 0);
        assert!(!engine.is_busy(&lesson("L1")));

        engine.confirm(pending).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected() {
        let (api, engine) = setup(course_api(vec![])).await;
        assert!(matches!(
            engine.bulk_export(&[], ExportFormat::Csv).await,
            Err(EngineError::Validation(_))
        ));
        assert_eq!(api.call_count(ApiOp::BulkExport).await, 0);
    }

    #[tokio::test]
    async fn test_bulk_export_returns_payload() {
        let (_api, engine) = setup(course_api(vec![])).await;
        let bytes = engine
            .bulk_export(&ids(&["L1", "L3"]), ExportFormat::Json)
            .await
            .unwrap();
        let exported: Vec<Lesson> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[1].id, lesson("L3"));
    }
}
