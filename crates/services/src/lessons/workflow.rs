use std::sync::Arc;

use lesson_core::model::{LessonCatalog, LessonId, UserProfile};
use lesson_core::session::{EventKind, LessonSession, PhaseKind, SessionError, Verdict};
use storage::repository::LessonSummaryRepository;

use super::active::ActiveLesson;
use super::progress::{LessonRun, RoundReport};
use crate::Clock;
use crate::config::EngineConfig;
use crate::error::LessonLoopError;
use crate::oracle::RecognitionOracle;
use crate::progression::ProgressionStore;

/// Drives lesson sessions against the oracle and commits completions.
#[derive(Clone)]
pub struct LessonLoopService {
    clock: Clock,
    config: EngineConfig,
    catalog: Arc<LessonCatalog>,
    oracle: Arc<dyn RecognitionOracle>,
    progression: Arc<ProgressionStore>,
    summaries: Arc<dyn LessonSummaryRepository>,
}

impl LessonLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<LessonCatalog>,
        oracle: Arc<dyn RecognitionOracle>,
        progression: Arc<ProgressionStore>,
        summaries: Arc<dyn LessonSummaryRepository>,
    ) -> Self {
        Self {
            clock,
            config: EngineConfig::default(),
            catalog,
            oracle,
            progression,
            summaries,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn progression(&self) -> &ProgressionStore {
        &self.progression
    }

    /// Start a fresh session; unknown ids get the fallback lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonLoopError::Session` if the configured heart budget is zero.
    pub fn start_lesson(&self, lesson_id: LessonId) -> Result<ActiveLesson, LessonLoopError> {
        if !self.catalog.contains(lesson_id) {
            tracing::warn!(
                requested = %lesson_id,
                fallback = %self.catalog.fallback().id(),
                "unknown lesson, using fallback"
            );
        }
        let lesson = self.catalog.lookup(lesson_id).clone();
        let session = LessonSession::with_hearts(lesson, self.config.starting_hearts, self.clock)?;
        tracing::info!(
            lesson_id = %session.lesson_id(),
            items = session.required(),
            hearts = session.hearts(),
            "lesson started"
        );
        Ok(ActiveLesson::new(session))
    }

    /// Learner has watched the demonstration.
    ///
    /// # Errors
    ///
    /// Returns `LessonLoopError::Session` outside the presenting phase.
    pub fn present(&self, lesson: &mut ActiveLesson) -> Result<(), LessonLoopError> {
        lesson.session_mut().advance_to_attempt()?;
        Ok(())
    }

    /// Submit an attempt and wait for the oracle's verdict.
    ///
    /// On timeout the session stays in `Judging`; call [`Self::retry_judgement`].
    ///
    /// # Errors
    ///
    /// Returns `LessonLoopError::Session` outside the awaiting phase, or
    /// `LessonLoopError::JudgeTimeout` when the oracle does not answer in time.
    pub async fn attempt(&self, lesson: &mut ActiveLesson) -> Result<Verdict, LessonLoopError> {
        let request = lesson.session_mut().submit_attempt()?;
        lesson.set_in_flight(Some(request));
        self.judge(lesson).await
    }

    /// Ask the oracle again for the round that is still being judged.
    ///
    /// # Errors
    ///
    /// Returns `LessonLoopError::Session` if nothing is being judged, or
    /// `LessonLoopError::JudgeTimeout` again.
    pub async fn retry_judgement(
        &self,
        lesson: &mut ActiveLesson,
    ) -> Result<Verdict, LessonLoopError> {
        if lesson.in_flight().is_none() {
            return Err(SessionError::InvalidTransition {
                event: EventKind::Verdict,
                phase: lesson.session().phase().kind(),
            }
            .into());
        }
        self.judge(lesson).await
    }

    /// True once the outstanding judgment has run past the judge timeout.
    #[must_use]
    pub fn is_judging_stalled(&self, lesson: &ActiveLesson) -> bool {
        let limit = chrono::Duration::from_std(self.config.judge_timeout())
            .unwrap_or(chrono::Duration::MAX);
        lesson.session().is_stuck(&self.clock, limit)
    }

    async fn judge(&self, lesson: &mut ActiveLesson) -> Result<Verdict, LessonLoopError> {
        let Some(request) = lesson.in_flight().cloned() else {
            return Err(SessionError::InvalidTransition {
                event: EventKind::Verdict,
                phase: lesson.session().phase().kind(),
            }
            .into());
        };

        let timeout = self.config.judge_timeout();
        let verdict = match tokio::time::timeout(
            timeout,
            self.oracle.judge(&request.item, request.attempt),
        )
        .await
        {
            Ok(verdict) => verdict,
            Err(_) => {
                tracing::warn!(
                    item = %request.item,
                    ticket = %request.ticket,
                    timeout_ms = self.config.judge_timeout_ms,
                    "recognition timed out"
                );
                return Err(LessonLoopError::JudgeTimeout {
                    item: request.item,
                    waited_ms: self.config.judge_timeout_ms,
                });
            }
        };

        lesson
            .session_mut()
            .deliver_verdict(request.ticket, verdict)?;
        lesson.set_in_flight(None);
        Ok(verdict)
    }

    /// Apply the resolved round. Completing the lesson commits progression.
    ///
    /// # Errors
    ///
    /// Returns `LessonLoopError::Session` outside the resolved phase. If the
    /// commit fails, the round is still applied and the error is returned;
    /// call [`Self::finalize`] to retry.
    pub async fn acknowledge(
        &self,
        lesson: &mut ActiveLesson,
    ) -> Result<RoundReport, LessonLoopError> {
        let outcome = lesson.session_mut().acknowledge_result()?;

        let lesson_id = lesson.session().lesson_id();
        if outcome.verdict.passed {
            tracing::info!(
                lesson_id = %lesson_id,
                item = %outcome.item,
                correct = outcome.correct_count,
                "round passed"
            );
        } else {
            tracing::info!(
                lesson_id = %lesson_id,
                item = %outcome.item,
                hearts = outcome.hearts,
                requeued = outcome.requeued,
                "round failed, heart lost"
            );
        }

        let profile = match outcome.next {
            PhaseKind::Completed => Some(self.finalize(lesson).await?),
            PhaseKind::Failed => {
                tracing::info!(lesson_id = %lesson_id, "out of hearts, lesson failed");
                None
            }
            _ => None,
        };

        Ok(RoundReport {
            item: outcome.item,
            verdict: outcome.verdict,
            hearts: outcome.hearts,
            correct_count: outcome.correct_count,
            requeued: outcome.requeued,
            phase: outcome.next,
            profile,
        })
    }

    /// Commit progression and the summary for a completed lesson.
    ///
    /// Safe to call repeatedly: each part is written at most once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` unless the lesson completed, or the
    /// progression / storage error of the part that failed.
    pub async fn finalize(&self, lesson: &mut ActiveLesson) -> Result<UserProfile, LessonLoopError> {
        if !lesson.session().is_completed() {
            return Err(SessionError::NotCompleted.into());
        }
        let lesson_id = lesson.session().lesson_id();
        let xp = self.progression.rules().xp_per_lesson;

        let profile = match lesson.committed_profile() {
            Some(profile) => profile.clone(),
            None => {
                let profile = self.progression.complete_lesson(lesson_id, xp).await?;
                lesson.set_committed(profile.clone());
                profile
            }
        };

        if lesson.summary_id().is_none() {
            let summary = lesson.session().summary(xp)?;
            let id = self.summaries.append_summary(&summary).await?;
            lesson.set_summary_id(id);
            tracing::info!(
                lesson_id = %lesson_id,
                summary_id = %id,
                rounds = summary.rounds(),
                hearts_left = summary.hearts_left(),
                "lesson completed"
            );
        }

        Ok(profile)
    }

    /// Play rounds until the lesson completes or runs out of hearts.
    ///
    /// # Errors
    ///
    /// Propagates the first error from any step.
    pub async fn run_to_end(&self, lesson: &mut ActiveLesson) -> Result<LessonRun, LessonLoopError> {
        let mut rounds = Vec::new();
        while !lesson.is_finished() {
            match lesson.session().phase().kind() {
                PhaseKind::Presenting => self.present(lesson)?,
                PhaseKind::AwaitingAttempt => {
                    self.attempt(lesson).await?;
                }
                PhaseKind::Judging => {
                    self.retry_judgement(lesson).await?;
                }
                PhaseKind::RoundResolved => rounds.push(self.acknowledge(lesson).await?),
                PhaseKind::Completed | PhaseKind::Failed => break,
            }
        }

        Ok(LessonRun {
            rounds,
            completed: lesson.session().is_completed(),
            profile: lesson.committed_profile().cloned(),
        })
    }
}

impl std::fmt::Debug for LessonLoopService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonLoopService")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
