use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::model::{ItemName, LessonDefinition, LessonId, LessonSummary};
use crate::time::Clock;

use super::types::{
    EventKind, JudgeRequest, Phase, RoundOutcome, RoundTicket, SessionError, SessionEvent, Step,
    Verdict,
};

/// Hearts granted at the start of every session.
pub const DEFAULT_HEARTS: u32 = 3;

/// One learner working through one lesson.
///
/// Owns the item queue, the heart budget and the lifecycle phase. Failed items
/// are appended to the back of the queue and must still be passed; the lesson
/// is complete once the number of passes reaches the lesson length.
pub struct LessonSession {
    lesson: LessonDefinition,
    clock: Clock,
    pending: Vec<ItemName>,
    cursor: usize,
    correct_count: usize,
    hearts: u32,
    starting_hearts: u32,
    phase: Phase,
    attempts: HashMap<ItemName, u32>,
    tickets_issued: u64,
    mistakes: u32,
    started_at: DateTime<Utc>,
    judging_since: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl LessonSession {
    /// Start a session with [`DEFAULT_HEARTS`].
    #[must_use]
    pub fn new(lesson: LessonDefinition, clock: Clock) -> Self {
        let pending = lesson.items().to_vec();
        let first = pending[0].clone();
        Self {
            clock,
            pending,
            cursor: 0,
            correct_count: 0,
            hearts: DEFAULT_HEARTS,
            starting_hearts: DEFAULT_HEARTS,
            phase: Phase::Presenting { item: first },
            attempts: HashMap::new(),
            tickets_issued: 0,
            mistakes: 0,
            started_at: clock.now(),
            judging_since: None,
            ended_at: None,
            lesson,
        }
    }

    /// Start a session with a custom heart budget.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoHearts` if `hearts` is zero.
    pub fn with_hearts(
        lesson: LessonDefinition,
        hearts: u32,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        if hearts == 0 {
            return Err(SessionError::NoHearts);
        }
        let mut session = Self::new(lesson, clock);
        session.hearts = hearts;
        session.starting_hearts = hearts;
        Ok(session)
    }

    //
    // ─── EVENTS ───────────────────────────────────────────────────────────────
    //

    /// Apply one event to the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the event is not valid in
    /// the current phase, or `SessionError::StaleVerdict` for a verdict whose
    /// ticket does not belong to the round being judged.
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<Step, SessionError> {
        match event {
            SessionEvent::AdvanceToAttempt => {
                self.advance_to_attempt()?;
                Ok(Step::AwaitingAttempt)
            }
            SessionEvent::SubmitAttempt => self.submit_attempt().map(Step::Judge),
            SessionEvent::Verdict { ticket, verdict } => {
                self.deliver_verdict(ticket, verdict)?;
                Ok(Step::Resolved(verdict))
            }
            SessionEvent::Acknowledge => self.acknowledge_result().map(Step::Applied),
        }
    }

    /// `Presenting → AwaitingAttempt`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside `Presenting`.
    pub fn advance_to_attempt(&mut self) -> Result<(), SessionError> {
        let Phase::Presenting { item } = &self.phase else {
            return Err(self.invalid(EventKind::AdvanceToAttempt));
        };
        self.phase = Phase::AwaitingAttempt { item: item.clone() };
        Ok(())
    }

    /// `AwaitingAttempt → Judging`; returns the request to hand to the oracle.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside `AwaitingAttempt`.
    pub fn submit_attempt(&mut self) -> Result<JudgeRequest, SessionError> {
        let Phase::AwaitingAttempt { item } = &self.phase else {
            return Err(self.invalid(EventKind::SubmitAttempt));
        };
        let item = item.clone();

        let counter = self.attempts.entry(item.clone()).or_insert(0);
        let attempt = *counter;
        *counter = counter.saturating_add(1);

        self.tickets_issued += 1;
        let ticket = RoundTicket::new(self.tickets_issued);

        self.judging_since = Some(self.clock.now());
        self.phase = Phase::Judging {
            item: item.clone(),
            ticket,
        };

        Ok(JudgeRequest {
            ticket,
            item,
            attempt,
        })
    }

    /// `Judging → RoundResolved`, accepting exactly one verdict per ticket.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::StaleVerdict` for an old or mismatched ticket and
    /// `SessionError::InvalidTransition` when nothing is being judged.
    pub fn deliver_verdict(
        &mut self,
        ticket: RoundTicket,
        verdict: Verdict,
    ) -> Result<(), SessionError> {
        match &self.phase {
            Phase::Judging {
                item,
                ticket: expected,
            } => {
                if *expected != ticket {
                    return Err(SessionError::StaleVerdict { got: ticket });
                }
                self.phase = Phase::RoundResolved {
                    item: item.clone(),
                    verdict,
                };
                self.judging_since = None;
                Ok(())
            }
            _ if ticket.value() >= 1 && ticket.value() <= self.tickets_issued => {
                Err(SessionError::StaleVerdict { got: ticket })
            }
            _ => Err(self.invalid(EventKind::Verdict)),
        }
    }

    /// Apply the resolved outcome and move to the next round or a terminal phase.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside `RoundResolved`.
    pub fn acknowledge_result(&mut self) -> Result<RoundOutcome, SessionError> {
        let Phase::RoundResolved { item, verdict } = &self.phase else {
            return Err(self.invalid(EventKind::Acknowledge));
        };
        let item = item.clone();
        let verdict = *verdict;
        let required = self.required();

        let mut requeued = false;
        let next = if verdict.passed {
            let correct = self.correct_count + 1;
            let next = if correct >= required {
                Phase::Completed { mastered: required }
            } else {
                self.presenting_at(self.cursor + 1, &self.pending)?
            };
            self.correct_count = correct;
            next
        } else {
            let hearts = self.hearts.saturating_sub(1);
            let next = if hearts == 0 {
                Phase::Failed
            } else {
                let mut pending = self.pending.clone();
                pending.push(item.clone());
                // A lost heart never completes a lesson on its own, but passes
                // on other items may already cover the requirement.
                let next = if self.correct_count >= required {
                    Phase::Completed { mastered: required }
                } else {
                    self.presenting_at(self.cursor + 1, &pending)?
                };
                self.pending = pending;
                requeued = true;
                next
            };
            self.hearts = hearts;
            self.mistakes = self.mistakes.saturating_add(1);
            next
        };

        if matches!(next, Phase::Presenting { .. }) {
            self.cursor += 1;
        }
        if next.is_terminal() {
            self.ended_at = Some(self.clock.now());
        }
        self.phase = next;

        Ok(RoundOutcome {
            item,
            verdict,
            hearts: self.hearts,
            correct_count: self.correct_count,
            requeued,
            next: self.phase.kind(),
        })
    }

    fn presenting_at(&self, index: usize, pending: &[ItemName]) -> Result<Phase, SessionError> {
        let item = pending.get(index).ok_or(SessionError::QueueExhausted)?;
        Ok(Phase::Presenting { item: item.clone() })
    }

    fn invalid(&self, event: EventKind) -> SessionError {
        SessionError::InvalidTransition {
            event,
            phase: self.phase.kind(),
        }
    }

    //
    // ─── QUERIES ──────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn lesson(&self) -> &LessonDefinition {
        &self.lesson
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson.id()
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Item currently being worked on; `None` once the session has ended.
    #[must_use]
    pub fn current_item(&self) -> Option<&ItemName> {
        self.phase.item()
    }

    /// Full queue including items already attempted.
    #[must_use]
    pub fn queue(&self) -> &[ItemName] {
        &self.pending
    }

    /// Items from the current one to the back of the queue.
    #[must_use]
    pub fn upcoming(&self) -> &[ItemName] {
        if self.phase.is_terminal() {
            return &[];
        }
        &self.pending[self.cursor.min(self.pending.len())..]
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Passes needed to complete: the lesson length, requeues excluded.
    #[must_use]
    pub fn required(&self) -> usize {
        self.lesson.len()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    #[must_use]
    pub fn hearts(&self) -> u32 {
        self.hearts
    }

    #[must_use]
    pub fn starting_hearts(&self) -> u32 {
        self.starting_hearts
    }

    #[must_use]
    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    /// Attempts submitted so far for `item`.
    #[must_use]
    pub fn attempts_for(&self, item: &ItemName) -> u32 {
        self.attempts.get(item).copied().unwrap_or(0)
    }

    /// Share of required passes achieved, 0..=100.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        let pct = self.correct_count.saturating_mul(100) / self.required().max(1);
        u8::try_from(pct.min(100)).unwrap_or(100)
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.phase, Phase::Completed { .. })
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.phase, Phase::Failed)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// How long the current judgment has been outstanding according to `clock`.
    #[must_use]
    pub fn judging_elapsed(&self, clock: &Clock) -> Option<Duration> {
        self.judging_since.map(|since| clock.elapsed_since(since))
    }

    /// True when a judgment has been outstanding for at least `limit`.
    #[must_use]
    pub fn is_stuck(&self, clock: &Clock, limit: Duration) -> bool {
        self.judging_elapsed(clock).is_some_and(|elapsed| elapsed >= limit)
    }

    /// Build the summary for a completed session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` unless the phase is `Completed`.
    pub fn summary(&self, xp_gained: u64) -> Result<LessonSummary, SessionError> {
        let (Phase::Completed { .. }, Some(ended_at)) = (&self.phase, self.ended_at) else {
            return Err(SessionError::NotCompleted);
        };
        let correct = u32::try_from(self.correct_count).unwrap_or(u32::MAX);
        Ok(LessonSummary::new(
            self.lesson.id(),
            self.started_at,
            ended_at,
            correct.saturating_add(self.mistakes),
            correct,
            self.mistakes,
            self.hearts,
            xp_gained,
        )?)
    }
}

impl fmt::Debug for LessonSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LessonSession")
            .field("lesson_id", &self.lesson.id())
            .field("phase", &self.phase.kind())
            .field("pending_len", &self.pending.len())
            .field("cursor", &self.cursor)
            .field("correct_count", &self.correct_count)
            .field("hearts", &self.hearts)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PhaseKind;
    use crate::time::{fixed_clock, fixed_now};

    fn lesson(words: &[&str]) -> LessonDefinition {
        LessonDefinition::from_words(LessonId::new(1), words.iter().copied()).unwrap()
    }

    fn start() -> LessonSession {
        LessonSession::new(lesson(&["Help", "Yes", "No"]), fixed_clock())
    }

    /// Plays one full round and returns the acknowledged outcome.
    fn play(session: &mut LessonSession, passed: bool) -> RoundOutcome {
        session.dispatch(SessionEvent::AdvanceToAttempt).unwrap();
        let Step::Judge(request) = session.dispatch(SessionEvent::SubmitAttempt).unwrap() else {
            panic!("expected a judge request");
        };
        let verdict = if passed {
            Verdict::pass(90)
        } else {
            Verdict::fail(30)
        };
        session
            .dispatch(SessionEvent::Verdict {
                ticket: request.ticket,
                verdict,
            })
            .unwrap();
        let Step::Applied(outcome) = session.dispatch(SessionEvent::Acknowledge).unwrap() else {
            panic!("expected an applied outcome");
        };
        outcome
    }

    fn names(items: &[ItemName]) -> Vec<&str> {
        items.iter().map(ItemName::as_str).collect()
    }

    #[test]
    fn new_session_presents_first_item() {
        let session = start();
        assert_eq!(session.phase().kind(), PhaseKind::Presenting);
        assert_eq!(session.current_item().unwrap().as_str(), "Help");
        assert_eq!(session.hearts(), 3);
        assert_eq!(session.correct_count(), 0);
        assert_eq!(session.cursor(), 0);
        assert_eq!(names(session.upcoming()), ["Help", "Yes", "No"]);
    }

    #[test]
    fn all_passes_complete_with_full_hearts() {
        let mut session = start();
        for _ in 0..3 {
            play(&mut session, true);
        }
        assert!(session.is_completed());
        assert_eq!(session.phase(), &Phase::Completed { mastered: 3 });
        assert_eq!(session.correct_count(), 3);
        assert_eq!(session.hearts(), 3);
        assert_eq!(session.progress_percent(), 100);
    }

    #[test]
    fn three_failures_end_the_session() {
        let mut session = start();
        let first = play(&mut session, false);
        assert!(first.requeued);
        play(&mut session, false);
        let last = play(&mut session, false);

        assert!(!last.requeued);
        assert_eq!(last.next, PhaseKind::Failed);
        assert!(session.is_failed());
        assert_eq!(session.correct_count(), 0);
        assert_eq!(session.hearts(), 0);
        assert!(session.summary(30).is_err());
    }

    #[test]
    fn failed_item_is_retried_after_the_rest() {
        let mut session = start();

        let outcome = play(&mut session, false);
        assert_eq!(outcome.item.as_str(), "Help");
        assert_eq!(outcome.hearts, 2);
        assert_eq!(outcome.correct_count, 0);
        assert_eq!(names(session.upcoming()), ["Yes", "No", "Help"]);

        play(&mut session, true);
        play(&mut session, true);
        assert_eq!(session.current_item().unwrap().as_str(), "Help");

        let outcome = play(&mut session, true);
        assert_eq!(outcome.next, PhaseKind::Completed);
        assert_eq!(session.correct_count(), 3);
        assert_eq!(session.hearts(), 2);
        assert_eq!(names(session.queue()), ["Help", "Yes", "No", "Help"]);

        let summary = session.summary(30).unwrap();
        assert_eq!(summary.rounds(), 4);
        assert_eq!(summary.mistakes(), 1);
        assert_eq!(summary.hearts_left(), 2);
        assert_eq!(summary.completed_at(), fixed_now());
    }

    #[test]
    fn single_item_lesson_completes_on_first_pass() {
        let mut session = LessonSession::new(lesson(&["Thanks"]), fixed_clock());
        let outcome = play(&mut session, true);
        assert_eq!(outcome.next, PhaseKind::Completed);
        assert_eq!(session.phase(), &Phase::Completed { mastered: 1 });
    }

    #[test]
    fn attempt_numbers_count_per_item() {
        let mut session = LessonSession::new(lesson(&["Help", "Yes"]), fixed_clock());
        session.advance_to_attempt().unwrap();
        let first = session.submit_attempt().unwrap();
        assert_eq!(first.attempt, 0);
        session.deliver_verdict(first.ticket, Verdict::fail(20)).unwrap();
        session.acknowledge_result().unwrap();

        play(&mut session, true);

        session.advance_to_attempt().unwrap();
        let retry = session.submit_attempt().unwrap();
        assert_eq!(retry.item.as_str(), "Help");
        assert_eq!(retry.attempt, 1);
        assert!(retry.ticket > first.ticket);
        assert_eq!(session.attempts_for(&retry.item), 2);
    }

    #[test]
    fn events_out_of_phase_are_rejected_without_side_effects() {
        let mut session = start();

        let err = session.dispatch(SessionEvent::SubmitAttempt).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                event: EventKind::SubmitAttempt,
                phase: PhaseKind::Presenting,
            }
        );
        assert_eq!(
            session.dispatch(SessionEvent::Acknowledge).unwrap_err(),
            SessionError::InvalidTransition {
                event: EventKind::Acknowledge,
                phase: PhaseKind::Presenting,
            }
        );

        session.advance_to_attempt().unwrap();
        assert!(session.advance_to_attempt().is_err());
        assert_eq!(session.phase().kind(), PhaseKind::AwaitingAttempt);
        assert_eq!(session.attempts_for(&ItemName::new("Help").unwrap()), 0);
    }

    #[test]
    fn verdict_is_accepted_once() {
        let mut session = start();
        session.advance_to_attempt().unwrap();
        let request = session.submit_attempt().unwrap();

        let wrong = RoundTicket::new(request.ticket.value() + 7);
        assert!(matches!(
            session.deliver_verdict(wrong, Verdict::pass(99)),
            Err(SessionError::InvalidTransition { .. }) | Err(SessionError::StaleVerdict { .. })
        ));
        assert_eq!(session.phase().kind(), PhaseKind::Judging);

        session.deliver_verdict(request.ticket, Verdict::pass(99)).unwrap();
        assert_eq!(
            session.deliver_verdict(request.ticket, Verdict::fail(10)),
            Err(SessionError::StaleVerdict {
                got: request.ticket
            })
        );
        assert_eq!(
            session.phase(),
            &Phase::RoundResolved {
                item: request.item,
                verdict: Verdict::pass(99),
            }
        );
    }

    #[test]
    fn old_ticket_cannot_resolve_a_later_round() {
        let mut session = start();
        let first = {
            session.advance_to_attempt().unwrap();
            let request = session.submit_attempt().unwrap();
            session.deliver_verdict(request.ticket, Verdict::pass(90)).unwrap();
            session.acknowledge_result().unwrap();
            request
        };

        session.advance_to_attempt().unwrap();
        let _second = session.submit_attempt().unwrap();
        assert_eq!(
            session.deliver_verdict(first.ticket, Verdict::fail(10)),
            Err(SessionError::StaleVerdict { got: first.ticket })
        );
        assert_eq!(session.phase().kind(), PhaseKind::Judging);
    }

    #[test]
    fn terminal_session_rejects_everything() {
        let mut session = LessonSession::new(lesson(&["Help"]), fixed_clock());
        play(&mut session, true);
        for event in [
            SessionEvent::AdvanceToAttempt,
            SessionEvent::SubmitAttempt,
            SessionEvent::Acknowledge,
        ] {
            assert!(matches!(
                session.dispatch(event),
                Err(SessionError::InvalidTransition {
                    phase: PhaseKind::Completed,
                    ..
                })
            ));
        }
        assert!(session.upcoming().is_empty());
    }

    #[test]
    fn correct_count_is_monotonic_and_bounded() {
        let script = [false, true, false, true, true];
        let mut session = LessonSession::new(lesson(&["Help", "Yes", "No"]), fixed_clock());
        let mut last = 0;
        for passed in script {
            if session.is_finished() {
                break;
            }
            let outcome = play(&mut session, passed);
            assert!(outcome.correct_count >= last);
            assert!(outcome.correct_count <= session.required());
            if !passed {
                assert_eq!(outcome.correct_count, last);
            }
            last = outcome.correct_count;
        }
        assert!(session.is_completed());
        assert_eq!(session.hearts(), 1);
    }

    #[test]
    fn custom_heart_budget() {
        assert_eq!(
            LessonSession::with_hearts(lesson(&["Help"]), 0, fixed_clock()).unwrap_err(),
            SessionError::NoHearts
        );
        let mut session = LessonSession::with_hearts(lesson(&["Help"]), 1, fixed_clock()).unwrap();
        let outcome = play(&mut session, false);
        assert_eq!(outcome.next, PhaseKind::Failed);
        assert_eq!(session.starting_hearts(), 1);
    }

    #[test]
    fn stuck_judgment_is_detectable() {
        let mut session = start();
        let mut clock = fixed_clock();
        assert_eq!(session.judging_elapsed(&clock), None);

        session.advance_to_attempt().unwrap();
        session.submit_attempt().unwrap();
        assert!(!session.is_stuck(&clock, Duration::seconds(10)));

        clock.advance(Duration::seconds(11));
        assert_eq!(session.judging_elapsed(&clock), Some(Duration::seconds(11)));
        assert!(session.is_stuck(&clock, Duration::seconds(10)));
    }
}
