use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::LessonId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("rounds ({rounds}) does not match correct + mistakes ({sum})")]
    CountMismatch { rounds: u32, sum: u32 },

    #[error("lesson summary requires at least one correct answer")]
    NothingMastered,
}

/// Aggregate record of one completed lesson session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSummary {
    lesson_id: LessonId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    rounds: u32,
    correct: u32,
    mistakes: u32,
    hearts_left: u32,
    xp_gained: u64,
}

impl LessonSummary {
    /// Build (or rehydrate) a lesson summary.
    ///
    /// # Errors
    ///
    /// Returns `LessonSummaryError::InvalidTimeRange` if `completed_at` is before `started_at`.
    /// Returns `LessonSummaryError::CountMismatch` if the round counts do not add up.
    /// Returns `LessonSummaryError::NothingMastered` if `correct` is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lesson_id: LessonId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        rounds: u32,
        correct: u32,
        mistakes: u32,
        hearts_left: u32,
        xp_gained: u64,
    ) -> Result<Self, LessonSummaryError> {
        if completed_at < started_at {
            return Err(LessonSummaryError::InvalidTimeRange);
        }
        if correct == 0 {
            return Err(LessonSummaryError::NothingMastered);
        }
        let sum = correct.saturating_add(mistakes);
        if sum != rounds {
            return Err(LessonSummaryError::CountMismatch { rounds, sum });
        }

        Ok(Self {
            lesson_id,
            started_at,
            completed_at,
            rounds,
            correct,
            mistakes,
            hearts_left,
            xp_gained,
        })
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Distinct items mastered; equals the lesson length.
    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    #[must_use]
    pub fn hearts_left(&self) -> u32 {
        self.hearts_left
    }

    #[must_use]
    pub fn xp_gained(&self) -> u64 {
        self.xp_gained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn summary_accepts_consistent_counts() {
        let now = fixed_now();
        let summary =
            LessonSummary::new(LessonId::new(1), now, now, 4, 3, 1, 2, 30).unwrap();
        assert_eq!(summary.rounds(), 4);
        assert_eq!(summary.hearts_left(), 2);
    }

    #[test]
    fn summary_rejects_mismatched_counts() {
        let now = fixed_now();
        let err = LessonSummary::new(LessonId::new(1), now, now, 5, 3, 1, 2, 30).unwrap_err();
        assert_eq!(err, LessonSummaryError::CountMismatch { rounds: 5, sum: 4 });
    }

    #[test]
    fn summary_rejects_reversed_time_range() {
        let now = fixed_now();
        let earlier = now - chrono::Duration::seconds(1);
        let err = LessonSummary::new(LessonId::new(1), now, earlier, 3, 3, 0, 3, 30).unwrap_err();
        assert_eq!(err, LessonSummaryError::InvalidTimeRange);
    }
}
