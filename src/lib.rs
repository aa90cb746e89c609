//! Course Dashboard
//!
//! Lesson ordering and module assignment for a course authoring dashboard.
//!
//! Layered architecture:
//! - domain: Lessons, modules and collaborator errors
//! - store: Session copy of the course with confirmed placements
//! - view: Filtered, sorted and grouped projections
//! - api: Remote store interfaces and an in-memory implementation
//! - reconcile: Optimistic mutations, confirmation and rollback
//! - dashboard: One open course, wired to drag and drop and selection

pub mod api;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod reconcile;
pub mod selection;
pub mod store;
pub mod view;

use std::str::FromStr;

use rolling_logger::{LoggerError, LoggerHandle, LoggerOptions};

pub use config::{ConfigError, DashboardConfig, LogConfig};
pub use dashboard::{Dashboard, Zone};
pub use dragdrop::{DropTarget, HoverChange};
pub use reconcile::{
    BatchResult, EngineError, EngineOptions, EngineResult, MoveIntent, MoveOutcome, Operation, PendingMove,
    ReconcileEngine,
};
pub use selection::Selection;
pub use store::{OrderingStore, SharedStore};
pub use view::{LessonView, ModuleFilter, SortKey, ViewFilter};

/// Start file logging as configured. Returns `None` when no log
/// directory is set.
pub fn init_logging(config: &DashboardConfig) -> Result<Option<LoggerHandle>, LoggerError> {
    let Some(dir) = config.log.dir.clone() else {
        return Ok(None);
    };

    let level = rolling_logger::Level::from_str(&config.log.level).ok();
    let options = LoggerOptions {
        max_file_bytes: config.log.max_file_bytes,
        buffer_lines: config.log.buffer_lines,
        level: level.unwrap_or(rolling_logger::Level::INFO),
    };
    let handle = rolling_logger::init_logger_with(dir, &config.log.app_name, options)?;
    if level.is_none() {
        log::warn!("[Config] Unknown log level {:?}, using info", config.log.level);
    }
    Ok(Some(handle))
}
