//! Remote course store
//!
//! Abstract collaborator interfaces plus an in-memory implementation.

mod memory;
mod traits;

pub use memory::{ApiCall, ApiOp, BulkMode, InMemoryCourseApi};
pub use traits::{BatchReport, BulkApi, CourseApi, ItemOutcome, LessonApi, ModuleApi, UploadApi};
