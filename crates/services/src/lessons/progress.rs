use lesson_core::model::{ItemName, UserProfile};
use lesson_core::session::{PhaseKind, Verdict};

/// Aggregated view of lesson progress, useful for a status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonProgress {
    pub required: usize,
    pub correct: usize,
    pub hearts: u32,
    pub starting_hearts: u32,
    pub percent: u8,
    pub phase: PhaseKind,
}

/// Result of acknowledging one round through the lesson loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub item: ItemName,
    pub verdict: Verdict,
    pub hearts: u32,
    pub correct_count: usize,
    pub requeued: bool,
    pub phase: PhaseKind,
    /// Updated profile, present only on the round that completed the lesson.
    pub profile: Option<UserProfile>,
}

/// Everything a full run of a lesson produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRun {
    pub rounds: Vec<RoundReport>,
    pub completed: bool,
    pub profile: Option<UserProfile>,
}
