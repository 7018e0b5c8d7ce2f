use std::fmt;

use lesson_core::model::{SummaryId, UserProfile};
use lesson_core::session::{JudgeRequest, LessonSession};

use super::progress::LessonProgress;

/// A running lesson plus the bookkeeping the loop needs around it.
///
/// Tracks the outstanding judge request and whether the completion has
/// already been committed, so progression is applied once per session.
pub struct ActiveLesson {
    session: LessonSession,
    in_flight: Option<JudgeRequest>,
    committed: Option<UserProfile>,
    summary_id: Option<SummaryId>,
}

impl ActiveLesson {
    pub(crate) fn new(session: LessonSession) -> Self {
        Self {
            session,
            in_flight: None,
            committed: None,
            summary_id: None,
        }
    }

    #[must_use]
    pub fn session(&self) -> &LessonSession {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut LessonSession {
        &mut self.session
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&JudgeRequest> {
        self.in_flight.as_ref()
    }

    pub(crate) fn set_in_flight(&mut self, request: Option<JudgeRequest>) {
        self.in_flight = request;
    }

    /// Profile returned by the progression store for this lesson, once committed.
    #[must_use]
    pub fn committed_profile(&self) -> Option<&UserProfile> {
        self.committed.as_ref()
    }

    pub(crate) fn set_committed(&mut self, profile: UserProfile) {
        self.committed = Some(profile);
    }

    #[must_use]
    pub fn summary_id(&self) -> Option<SummaryId> {
        self.summary_id
    }

    pub(crate) fn set_summary_id(&mut self, id: SummaryId) {
        self.summary_id = Some(id);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    #[must_use]
    pub fn progress(&self) -> LessonProgress {
        LessonProgress {
            required: self.session.required(),
            correct: self.session.correct_count(),
            hearts: self.session.hearts(),
            starting_hearts: self.session.starting_hearts(),
            percent: self.session.progress_percent(),
            phase: self.session.phase().kind(),
        }
    }
}

impl fmt::Debug for ActiveLesson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveLesson")
            .field("session", &self.session)
            .field("in_flight", &self.in_flight)
            .field("committed", &self.committed.is_some())
            .field("summary_id", &self.summary_id)
            .finish()
    }
}
