use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::LessonId;

/// Percent of a level; `level_progress` always stays below this.
pub const LEVEL_SPAN: u32 = 100;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("profile name cannot be empty")]
    EmptyName,

    #[error("level must be at least 1")]
    InvalidLevel,

    #[error("level progress must be below {LEVEL_SPAN}, got {0}")]
    InvalidLevelProgress(u32),
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Rewards granted for one completed lesson.
///
/// XP and level progress are independent knobs; progress is not derived from XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionRules {
    pub xp_per_lesson: u64,
    pub progress_per_lesson: u32,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self {
            xp_per_lesson: 30,
            progress_per_lesson: 6,
        }
    }
}

//
// ─── PROFILE ───────────────────────────────────────────────────────────────────
//

/// Long-lived learner statistics.
///
/// Deserialization goes through [`UserProfile::from_persisted`], so a stored
/// document cannot bypass validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PersistedProfile")]
pub struct UserProfile {
    name: String,
    experience_points: u64,
    level: u32,
    level_progress: u32,
    streak: u32,
    completed_lesson_ids: Vec<LessonId>,
}

/// Wire shape of a stored profile before validation.
#[derive(Deserialize)]
struct PersistedProfile {
    name: String,
    experience_points: u64,
    level: u32,
    level_progress: u32,
    streak: u32,
    #[serde(default)]
    completed_lesson_ids: Vec<LessonId>,
}

impl TryFrom<PersistedProfile> for UserProfile {
    type Error = ProfileError;

    fn try_from(raw: PersistedProfile) -> Result<Self, Self::Error> {
        Self::from_persisted(
            raw.name,
            raw.experience_points,
            raw.level,
            raw.level_progress,
            raw.streak,
            raw.completed_lesson_ids,
        )
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "Alex".to_string(),
            experience_points: 1250,
            level: 5,
            level_progress: 65,
            streak: 5,
            completed_lesson_ids: Vec::new(),
        }
    }
}

impl UserProfile {
    /// Rehydrate a profile from persisted storage.
    ///
    /// Duplicate lesson ids are collapsed, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if the name is blank, the level is zero, or the
    /// stored progress is out of range.
    pub fn from_persisted(
        name: impl Into<String>,
        experience_points: u64,
        level: u32,
        level_progress: u32,
        streak: u32,
        completed_lesson_ids: Vec<LessonId>,
    ) -> Result<Self, ProfileError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProfileError::EmptyName);
        }
        if level == 0 {
            return Err(ProfileError::InvalidLevel);
        }
        if level_progress >= LEVEL_SPAN {
            return Err(ProfileError::InvalidLevelProgress(level_progress));
        }

        let mut completed = Vec::with_capacity(completed_lesson_ids.len());
        for id in completed_lesson_ids {
            if !completed.contains(&id) {
                completed.push(id);
            }
        }

        Ok(Self {
            name: name.trim().to_string(),
            experience_points,
            level,
            level_progress,
            streak,
            completed_lesson_ids: completed,
        })
    }

    /// Apply one lesson-completion event and return the resulting profile.
    ///
    /// The lesson id is recorded at most once, while XP, progress and streak
    /// advance on every call. Progress past [`LEVEL_SPAN`] rolls over into
    /// whole levels.
    #[must_use]
    pub fn complete_lesson(
        &self,
        lesson_id: LessonId,
        xp_gained: u64,
        rules: &ProgressionRules,
    ) -> Self {
        let mut next = self.clone();

        if !next.completed_lesson_ids.contains(&lesson_id) {
            next.completed_lesson_ids.push(lesson_id);
        }

        next.experience_points = next.experience_points.saturating_add(xp_gained);

        let mut progress = next.level_progress.saturating_add(rules.progress_per_lesson);
        while progress >= LEVEL_SPAN {
            next.level = next.level.saturating_add(1);
            progress -= LEVEL_SPAN;
        }
        next.level_progress = progress;

        // No calendar tracking: every completion extends the streak.
        next.streak = next.streak.saturating_add(1);

        next
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn experience_points(&self) -> u64 {
        self.experience_points
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn level_progress(&self) -> u32 {
        self.level_progress
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn completed_lesson_ids(&self) -> &[LessonId] {
        &self.completed_lesson_ids
    }

    #[must_use]
    pub fn has_completed(&self, lesson_id: LessonId) -> bool {
        self.completed_lesson_ids.contains(&lesson_id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
