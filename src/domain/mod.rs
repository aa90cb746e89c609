//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has NO dependencies on the engine or the collaborators.

mod error;
mod ids;
mod lesson;
mod media;
mod module;

pub use error::{DomainError, DomainResult};
pub use ids::{CourseId, LessonId, ModuleId};
pub use lesson::{Lesson, LessonDraft, LessonKind, LessonPatch, Placement, PublishStatus};
pub use media::{AssetKind, ExportFormat, LessonMedia, MediaFile};
pub use module::{Module, ModulePatch};
