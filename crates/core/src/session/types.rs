use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ItemName, LessonSummaryError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {event} while {phase}")]
    InvalidTransition { event: EventKind, phase: PhaseKind },

    #[error("verdict for round {got} is stale")]
    StaleVerdict { got: RoundTicket },

    #[error("a session needs at least one heart")]
    NoHearts,

    #[error("lesson is not completed")]
    NotCompleted,

    #[error("no item left to present")]
    QueueExhausted,

    #[error(transparent)]
    Summary(#[from] LessonSummaryError),
}

//
// ─── VERDICT ───────────────────────────────────────────────────────────────────
//

/// Pass/fail judgment for one attempt.
///
/// `confidence` is for display only and never drives the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub confidence: u8,
}

impl Verdict {
    /// Confidence is clamped to 100.
    #[must_use]
    pub fn pass(confidence: u8) -> Self {
        Self {
            passed: true,
            confidence: confidence.min(100),
        }
    }

    /// Confidence is clamped to 100.
    #[must_use]
    pub fn fail(confidence: u8) -> Self {
        Self {
            passed: false,
            confidence: confidence.min(100),
        }
    }
}

/// Identifies one submitted attempt; a verdict must quote the ticket it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundTicket(u64);

impl RoundTicket {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RoundTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Work handed to the recognition oracle after `SubmitAttempt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeRequest {
    pub ticket: RoundTicket,
    pub item: ItemName,
    /// Earlier attempts at this item within the session (0 for the first try).
    pub attempt: u32,
}

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Reference demonstration for `item` is on screen.
    Presenting { item: ItemName },
    AwaitingAttempt { item: ItemName },
    Judging { item: ItemName, ticket: RoundTicket },
    RoundResolved { item: ItemName, verdict: Verdict },
    Completed { mastered: usize },
    Failed,
}

impl Phase {
    #[must_use]
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Presenting { .. } => PhaseKind::Presenting,
            Phase::AwaitingAttempt { .. } => PhaseKind::AwaitingAttempt,
            Phase::Judging { .. } => PhaseKind::Judging,
            Phase::RoundResolved { .. } => PhaseKind::RoundResolved,
            Phase::Completed { .. } => PhaseKind::Completed,
            Phase::Failed => PhaseKind::Failed,
        }
    }

    /// The item this phase is about, if the session is still running.
    #[must_use]
    pub fn item(&self) -> Option<&ItemName> {
        match self {
            Phase::Presenting { item }
            | Phase::AwaitingAttempt { item }
            | Phase::Judging { item, .. }
            | Phase::RoundResolved { item, .. } => Some(item),
            Phase::Completed { .. } | Phase::Failed => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed { .. } | Phase::Failed)
    }
}

/// Payload-free phase tag, for errors and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    Presenting,
    AwaitingAttempt,
    Judging,
    RoundResolved,
    Completed,
    Failed,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PhaseKind::Presenting => "presenting",
            PhaseKind::AwaitingAttempt => "awaiting attempt",
            PhaseKind::Judging => "judging",
            PhaseKind::RoundResolved => "round resolved",
            PhaseKind::Completed => "completed",
            PhaseKind::Failed => "failed",
        };
        f.write_str(label)
    }
}

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Learner has watched the demonstration and is ready to try.
    AdvanceToAttempt,
    SubmitAttempt,
    Verdict { ticket: RoundTicket, verdict: Verdict },
    Acknowledge,
}

impl SessionEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::AdvanceToAttempt => EventKind::AdvanceToAttempt,
            SessionEvent::SubmitAttempt => EventKind::SubmitAttempt,
            SessionEvent::Verdict { .. } => EventKind::Verdict,
            SessionEvent::Acknowledge => EventKind::Acknowledge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AdvanceToAttempt,
    SubmitAttempt,
    Verdict,
    Acknowledge,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::AdvanceToAttempt => "advance to attempt",
            EventKind::SubmitAttempt => "submit attempt",
            EventKind::Verdict => "deliver verdict",
            EventKind::Acknowledge => "acknowledge result",
        };
        f.write_str(label)
    }
}

//
// ─── STEP RESULTS ──────────────────────────────────────────────────────────────
//

/// What a successful `dispatch` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    AwaitingAttempt,
    Judge(JudgeRequest),
    Resolved(Verdict),
    Applied(RoundOutcome),
}

/// Effect of acknowledging one resolved round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub item: ItemName,
    pub verdict: Verdict,
    pub hearts: u32,
    pub correct_count: usize,
    pub requeued: bool,
    pub next: PhaseKind,
}
