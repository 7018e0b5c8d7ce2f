#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod lessons;
pub mod oracle;
pub mod progression;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use config::EngineConfig;
pub use error::{AppServicesError, ConfigError, LessonLoopError, ProgressionError};
pub use lessons::{
    ActiveLesson, LessonHistoryItem, LessonHistoryService, LessonLoopService, LessonProgress,
    LessonRun, RoundReport,
};
pub use oracle::{DecisionOracle, OraclePolicy, RecognitionOracle, ScriptedOracle};
pub use progression::ProgressionStore;
