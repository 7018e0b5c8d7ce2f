use async_trait::async_trait;
use lesson_core::model::{LessonId, LessonSummary, SummaryId, UserProfile};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted lesson summary together with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSummaryRow {
    pub id: SummaryId,
    pub summary: LessonSummary,
}

impl LessonSummaryRow {
    #[must_use]
    pub fn new(id: SummaryId, summary: LessonSummary) -> Self {
        Self { id, summary }
    }
}

/// Durable home of the single learner profile.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Load the stored profile, or `None` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be read or decoded.
    async fn load_profile(&self) -> Result<Option<UserProfile>, StorageError>;

    /// Replace the stored profile as one write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError>;
}

#[async_trait]
pub trait LessonSummaryRepository: Send + Sync {
    /// Append a completed-lesson summary.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the summary cannot be stored.
    async fn append_summary(&self, summary: &LessonSummary) -> Result<SummaryId, StorageError>;

    /// Fetch one summary by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_summary(&self, id: SummaryId) -> Result<LessonSummary, StorageError>;

    /// Newest summaries first, optionally restricted to one lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_summaries(
        &self,
        lesson_id: Option<LessonId>,
        limit: u32,
    ) -> Result<Vec<LessonSummaryRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    profile: Arc<Mutex<Option<UserProfile>>>,
    summaries: Arc<Mutex<Vec<LessonSummaryRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn load_profile(&self) -> Result<Option<UserProfile>, StorageError> {
        let guard = self
            .profile
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let mut guard = self
            .profile
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(profile.clone());
        Ok(())
    }
}

#[async_trait]
impl LessonSummaryRepository for InMemoryRepository {
    async fn append_summary(&self, summary: &LessonSummary) -> Result<SummaryId, StorageError> {
        let mut guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let next = i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("summary id overflow".into()))?
            + 1;
        let id = SummaryId::new(next);
        guard.push(LessonSummaryRow::new(id, summary.clone()));
        Ok(id)
    }

    async fn get_summary(&self, id: SummaryId) -> Result<LessonSummary, StorageError> {
        let guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.summary.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_summaries(
        &self,
        lesson_id: Option<LessonId>,
        limit: u32,
    ) -> Result<Vec<LessonSummaryRow>, StorageError> {
        let guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut rows: Vec<_> = guard
            .iter()
            .filter(|row| lesson_id.is_none_or(|id| row.summary.lesson_id() == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.summary
                .completed_at()
                .cmp(&a.summary.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn ProfileRepository>,
    pub summaries: Arc<dyn LessonSummaryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo.clone());
        let summaries: Arc<dyn LessonSummaryRepository> = Arc::new(repo);
        Self {
            profiles,
            summaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::ProgressionRules;
    use lesson_core::time::fixed_now;

    fn summary(lesson: u64, offset_secs: i64) -> LessonSummary {
        let at = fixed_now() + chrono::Duration::seconds(offset_secs);
        LessonSummary::new(LessonId::new(lesson), fixed_now(), at, 3, 3, 0, 3, 30).unwrap()
    }

    #[tokio::test]
    async fn profile_starts_empty_and_round_trips() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_profile().await.unwrap().is_none());

        let profile = UserProfile::default().complete_lesson(
            LessonId::new(1),
            30,
            &ProgressionRules::default(),
        );
        repo.save_profile(&profile).await.unwrap();

        assert_eq!(repo.load_profile().await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn summaries_list_newest_first() {
        let repo = InMemoryRepository::new();
        let first = repo.append_summary(&summary(1, 10)).await.unwrap();
        let second = repo.append_summary(&summary(2, 20)).await.unwrap();
        let third = repo.append_summary(&summary(1, 30)).await.unwrap();

        let all = repo.list_summaries(None, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|row| row.id).collect();
        assert_eq!(ids, [third, second, first]);

        let lesson_one = repo.list_summaries(Some(LessonId::new(1)), 1).await.unwrap();
        assert_eq!(lesson_one.len(), 1);
        assert_eq!(lesson_one[0].id, third);

        assert!(matches!(
            repo.get_summary(SummaryId::new(99)).await,
            Err(StorageError::NotFound)
        ));
    }
}
