use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use lesson_core::model::{LessonId, LessonSummary, SummaryId};
use storage::repository::{LessonSummaryRepository, LessonSummaryRow};

use crate::Clock;
use crate::error::LessonLoopError;

/// Presentation-agnostic list item for a completed lesson.
///
/// No pre-formatted strings; callers format timestamps themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonHistoryItem {
    pub id: SummaryId,
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
    pub rounds: u32,
    pub mistakes: u32,
    pub hearts_left: u32,
    pub xp_gained: u64,
}

impl LessonHistoryItem {
    #[must_use]
    pub fn from_row(row: &LessonSummaryRow) -> Self {
        let summary = &row.summary;
        Self {
            id: row.id,
            lesson_id: summary.lesson_id(),
            completed_at: summary.completed_at(),
            rounds: summary.rounds(),
            mistakes: summary.mistakes(),
            hearts_left: summary.hearts_left(),
            xp_gained: summary.xp_gained(),
        }
    }
}

/// Read side of the lesson summary history.
#[derive(Clone)]
pub struct LessonHistoryService {
    clock: Clock,
    summaries: Arc<dyn LessonSummaryRepository>,
}

impl LessonHistoryService {
    #[must_use]
    pub fn new(clock: Clock, summaries: Arc<dyn LessonSummaryRepository>) -> Self {
        Self { clock, summaries }
    }

    /// Completed lessons from the last `days` days, newest first.
    ///
    /// A window reaching past the representable calendar keeps every row.
    ///
    /// # Errors
    ///
    /// Returns `LessonLoopError::Storage` on repository failures.
    pub async fn list_recent(
        &self,
        lesson_id: Option<LessonId>,
        days: i64,
        limit: u32,
    ) -> Result<Vec<LessonHistoryItem>, LessonLoopError> {
        let cutoff = Duration::try_days(days.max(0))
            .and_then(|window| self.clock.now().checked_sub_signed(window));
        let rows = self.summaries.list_summaries(lesson_id, limit).await?;
        Ok(rows
            .iter()
            .filter(|row| cutoff.is_none_or(|cutoff| row.summary.completed_at() >= cutoff))
            .map(LessonHistoryItem::from_row)
            .collect())
    }

    /// # Errors
    ///
    /// Returns `LessonLoopError::Storage` when the summary is missing or unreadable.
    pub async fn get_summary(&self, id: SummaryId) -> Result<LessonSummary, LessonLoopError> {
        Ok(self.summaries.get_summary(id).await?)
    }
}
