//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::{ItemName, UserProfile};
use lesson_core::session::SessionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressionStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    /// The update was computed but could not be written. The in-memory
    /// profile is unchanged; `unwritten` can be passed to `commit` to retry.
    #[error("failed to persist profile update")]
    Persistence {
        unwritten: Box<UserProfile>,
        #[source]
        source: StorageError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressionError {
    /// The computed-but-unsaved profile, if this was a write failure.
    #[must_use]
    pub fn unwritten(&self) -> Option<&UserProfile> {
        match self {
            ProgressionError::Persistence { unwritten, .. } => Some(unwritten),
            ProgressionError::Storage(_) => None,
        }
    }
}

/// Errors emitted while loading `EngineConfig`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {key}: {raw}")]
    InvalidValue { key: &'static str, raw: String },
    #[error("starting hearts must be at least 1")]
    ZeroHearts,
    #[error("judge timeout must be greater than zero")]
    ZeroJudgeTimeout,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors emitted by the lesson loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonLoopError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("recognition for {item} did not answer within {waited_ms} ms")]
    JudgeTimeout { item: ItemName, waited_ms: u64 },
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error(transparent)]
    Catalog(#[from] lesson_core::model::LessonError),
}
