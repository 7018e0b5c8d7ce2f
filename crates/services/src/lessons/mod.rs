mod active;
mod history;
mod progress;
mod workflow;

// Public API of the lesson subsystem.
pub use active::ActiveLesson;
pub use history::{LessonHistoryItem, LessonHistoryService};
pub use progress::{LessonProgress, LessonRun, RoundReport};
pub use workflow::LessonLoopService;
