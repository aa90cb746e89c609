//! Lesson Entity
//!
//! The unit being ordered. A lesson belongs to at most one module and has a
//! position within it.

use serde::{Deserialize, Serialize};
use super::error::{DomainError, DomainResult};
use super::ids::{LessonId, ModuleId};

const MAX_TITLE_LEN: usize = 200;

/// Lesson type determines how the lesson is authored and played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    #[default]
    Video,
    Text,
    Quiz,
    Assignment,
}

impl LessonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonKind::Video => "video",
            LessonKind::Text => "text",
            LessonKind::Quiz => "quiz",
            LessonKind::Assignment => "assignment",
        }
    }
}

/// Publication status, shared by lessons and modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    #[default]
    Draft,
    Published,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Published => "published",
        }
    }
}

/// Where a lesson sits: its module (None = ungrouped) and rank within it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub module_id: Option<ModuleId>,
    pub position: i32,
}

/// A lesson within a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Unique identifier
    pub id: LessonId,
    pub title: String,
    pub kind: LessonKind,
    pub status: PublishStatus,
    /// Owning module (None = ungrouped)
    #[serde(default)]
    pub module_id: Option<ModuleId>,
    /// Rank within the module. Not guaranteed contiguous.
    #[serde(default)]
    pub position: i32,

    // Display-only fields:
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub is_free: bool,
    /// Share of enrolled students who completed the lesson, 0.0..=1.0
    #[serde(default)]
    pub completion_rate: f32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl Lesson {
    /// Create a new ungrouped lesson with default values
    pub fn new(id: impl Into<LessonId>, title: impl Into<String>, kind: LessonKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            status: PublishStatus::Draft,
            module_id: None,
            position: 0,
            duration_secs: 0,
            view_count: 0,
            is_free: false,
            completion_rate: 0.0,
            description: None,
            thumbnail_url: None,
            video_url: None,
        }
    }

    /// Create a new lesson inside a module
    pub fn in_module(
        id: impl Into<LessonId>,
        title: impl Into<String>,
        kind: LessonKind,
        module_id: impl Into<ModuleId>,
        position: i32,
    ) -> Self {
        Self {
            module_id: Some(module_id.into()),
            position,
            ..Self::new(id, title, kind)
        }
    }

    pub fn is_ungrouped(&self) -> bool {
        self.module_id.is_none()
    }

    pub fn placement(&self) -> Placement {
        Placement {
            module_id: self.module_id.clone(),
            position: self.position,
        }
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.module_id = placement.module_id;
        self.position = placement.position;
    }
}

fn validate_title(title: &str) -> DomainResult<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput("title is required".to_string()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::InvalidInput(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

/// Fields for creating a lesson
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonDraft {
    pub title: String,
    pub kind: LessonKind,
    pub status: PublishStatus,
    pub module_id: Option<ModuleId>,
    pub description: Option<String>,
    pub duration_secs: u32,
    pub is_free: bool,
    /// Filled in after the thumbnail upload
    pub thumbnail_url: Option<String>,
    /// Filled in after the video upload
    pub video_url: Option<String>,
}

impl LessonDraft {
    pub fn new(title: impl Into<String>, kind: LessonKind) -> Self {
        Self {
            title: title.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn in_module(mut self, module_id: impl Into<ModuleId>) -> Self {
        self.module_id = Some(module_id.into());
        self
    }

    /// Checks required fields; runs before any network call
    pub fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)
    }
}

/// Partial update of a lesson. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<LessonKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_free: Option<bool>,
    /// Module reassignment; `Some(None)` moves the lesson to ungrouped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<Option<ModuleId>>,
}

impl LessonPatch {
    /// Patch that only reassigns the module
    pub fn module(module_id: Option<ModuleId>) -> Self {
        Self {
            module: Some(module_id),
            ..Default::default()
        }
    }

    pub fn changes_module(&self) -> bool {
        self.module.is_some()
    }

    pub fn validate(&self) -> DomainResult<()> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    /// Apply the field edits to `lesson`. Module changes are left to the caller,
    /// which must keep positions consistent.
    pub fn apply_fields(&self, lesson: &mut Lesson) {
        if let Some(title) = &self.title {
            lesson.title = title.trim().to_string();
        }
        if let Some(kind) = self.kind {
            lesson.kind = kind;
        }
        if let Some(status) = self.status {
            lesson.status = status;
        }
        if let Some(description) = &self.description {
            lesson.description = Some(description.clone());
        }
        if let Some(duration) = self.duration_secs {
            lesson.duration_secs = duration;
        }
        if let Some(is_free) = self.is_free {
            lesson.is_free = is_free;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lesson_creation() {
        let lesson = Lesson::new("L1", "Welcome", LessonKind::Video);
        assert_eq!(lesson.id.as_str(), "L1");
        assert_eq!(lesson.status, PublishStatus::Draft);
        assert!(lesson.is_ungrouped());
    }

    #[test]
    fn test_lesson_in_module() {
        let lesson = Lesson::in_module("L2", "Setup", LessonKind::Text, "intro", 3);
        assert_eq!(lesson.module_id, Some(ModuleId::from("intro")));
        assert_eq!(lesson.position, 3);
        assert!(!lesson.is_ungrouped());
    }

    #[test]
    fn test_lesson_kind_serialization() {
        assert_eq!(LessonKind::Quiz.as_str(), "quiz");
        assert_eq!(serde_json::from_str::<LessonKind>("\"assignment\"").unwrap(), LessonKind::Assignment);
        assert_eq!(serde_json::to_string(&LessonKind::Text).unwrap(), "\"text\"");
    }

    #[test]
    fn test_draft_requires_title() {
        assert!(LessonDraft::new("   ", LessonKind::Text).validate().is_err());
        assert!(LessonDraft::new("x".repeat(201), LessonKind::Text).validate().is_err());
        assert!(LessonDraft::new("Intro", LessonKind::Text).validate().is_ok());
    }

    #[test]
    fn test_patch_applies_fields_but_not_module() {
        let mut lesson = Lesson::in_module("L1", "Old", LessonKind::Video, "intro", 0);
        let patch = LessonPatch {
            title: Some("  New  ".to_string()),
            is_free: Some(true),
            module: Some(None),
            ..Default::default()
        };
        patch.apply_fields(&mut lesson);
        assert_eq!(lesson.title, "New");
        assert!(lesson.is_free);
        assert_eq!(lesson.module_id, Some(ModuleId::from("intro")));
        assert!(patch.changes_module());
    }
}
