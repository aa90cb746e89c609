//! Module Entity
//!
//! An optional named container for lessons. Membership is derived from
//! `Lesson::module_id`, never stored on the module.

use serde::{Deserialize, Serialize};
use super::error::{DomainError, DomainResult};
use super::ids::ModuleId;
use super::lesson::PublishStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub title: String,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub description: Option<String>,
}

impl Module {
    pub fn new(id: impl Into<ModuleId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: PublishStatus::Draft,
            description: None,
        }
    }
}

/// Partial update of a module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModulePatch {
    pub fn validate(&self) -> DomainResult<()> {
        match &self.title {
            Some(title) if title.trim().is_empty() => {
                Err(DomainError::InvalidInput("module title is required".to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn apply_to(&self, module: &mut Module) {
        if let Some(title) = &self.title {
            module.title = title.trim().to_string();
        }
        if let Some(status) = self.status {
            module.status = status;
        }
        if let Some(description) = &self.description {
            module.description = Some(description.clone());
        }
    }
}
