//! Engine errors and operation names

use std::fmt;

use dragdrop::DragError;

use super::activity::ActivityClass;
use crate::domain::{DomainError, LessonId, ModuleId};

/// Engine Result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Mutations the engine sends to the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    LoadCourse,
    CreateLesson,
    UploadMedia,
    UpdateLesson,
    DeleteLesson,
    ReorderLessons,
    MoveLesson,
    UpdateModule,
    UpdateStatuses,
    DeleteLessons,
    ExportLessons,
}

impl Operation {
    pub fn class(&self) -> ActivityClass {
        match self {
            Operation::LoadCourse => ActivityClass::Fetch,
            Operation::CreateLesson | Operation::UploadMedia => ActivityClass::Create,
            Operation::UpdateLesson
            | Operation::MoveLesson
            | Operation::UpdateModule
            | Operation::UpdateStatuses => ActivityClass::Update,
            Operation::DeleteLesson | Operation::DeleteLessons => ActivityClass::Delete,
            Operation::ReorderLessons => ActivityClass::Reorder,
            Operation::ExportLessons => ActivityClass::Export,
        }
    }
}

/// Phrased to complete "Could not ..."
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            Operation::LoadCourse => "load the course",
            Operation::CreateLesson => "create the lesson",
            Operation::UploadMedia => "upload the lesson media",
            Operation::UpdateLesson => "save the lesson",
            Operation::DeleteLesson => "delete the lesson",
            Operation::ReorderLessons => "save the new lesson order",
            Operation::MoveLesson => "move the lesson to another module",
            Operation::UpdateModule => "save the module",
            Operation::UpdateStatuses => "change the status of the selected lessons",
            Operation::DeleteLessons => "delete the selected lessons",
            Operation::ExportLessons => "export the selected lessons",
        };
        f.write_str(phrase)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("Lesson {0} no longer exists")]
    UnknownLesson(LessonId),

    #[error("Module {0} no longer exists")]
    UnknownModule(ModuleId),

    #[error("Lesson {0} is still being saved, try again in a moment")]
    Busy(LessonId),

    #[error("Another change to {} is still being saved, try again in a moment", module_label(.0))]
    ModuleBusy(Option<ModuleId>),

    #[error("No course is open")]
    NoCourse,

    #[error("Could not {operation}")]
    Failed {
        operation: Operation,
        #[source]
        source: DomainError,
    },

    #[error("Could not {operation} because an earlier change to the same module failed")]
    Superseded { operation: Operation },

    #[error(transparent)]
    Drag(#[from] DragError),
}

impl EngineError {
    pub(crate) fn failed(operation: Operation) -> impl FnOnce(DomainError) -> Self {
        move |source| EngineError::Failed { operation, source }
    }

    pub(crate) fn invalid(error: DomainError) -> Self {
        match error {
            DomainError::InvalidInput(message) => EngineError::Validation(message),
            other => EngineError::Validation(other.to_string()),
        }
    }

    /// The operation a remote failure belongs to
    pub fn operation(&self) -> Option<Operation> {
        match self {
            EngineError::Failed { operation, .. } | EngineError::Superseded { operation } => Some(*operation),
            _ => None,
        }
    }

    /// Whether repeating the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Busy(_) | EngineError::ModuleBusy(_) | EngineError::Superseded { .. } => true,
            EngineError::Failed { source, .. } => matches!(source, DomainError::Unavailable(_)),
            _ => false,
        }
    }
}

fn module_label(module_id: &Option<ModuleId>) -> String {
    match module_id {
        Some(id) => format!("module {}", id),
        None => "the ungrouped lessons".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_message_names_operation() {
        let err = EngineError::failed(Operation::ReorderLessons)(DomainError::Unavailable(
            "upstream 503 from 10.0.0.7:8443".into(),
        ));
        assert_eq!(err.to_string(), "Could not save the new lesson order");
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("Service unavailable: upstream 503 from 10.0.0.7:8443"));
        assert!(err.is_retryable());
        assert_eq!(err.operation(), Some(Operation::ReorderLessons));
    }

    #[test]
    fn test_invalid_input_becomes_validation() {
        let err = EngineError::invalid(DomainError::InvalidInput("title is required".into()));
        assert_eq!(err.to_string(), "title is required");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_module_busy_names_the_module() {
        let err = EngineError::ModuleBusy(Some(ModuleId::from("intro")));
        assert_eq!(
            err.to_string(),
            "Another change to module intro is still being saved, try again in a moment"
        );
        assert!(EngineError::ModuleBusy(None).to_string().contains("the ungrouped lessons"));
        assert!(err.is_retryable());
    }
}
