use std::sync::Arc;

use lesson_core::model::{LessonId, ProgressionRules, UserProfile};
use storage::repository::ProfileRepository;
use tokio::sync::{Mutex, watch};

use crate::error::ProgressionError;

/// Single owner of the learner profile.
///
/// Every update is read → compute → write under one lock. The cached profile
/// and subscribers only observe a new profile after the write succeeded.
pub struct ProgressionStore {
    repo: Arc<dyn ProfileRepository>,
    rules: ProgressionRules,
    current: Mutex<UserProfile>,
    changes: watch::Sender<UserProfile>,
}

impl ProgressionStore {
    /// Load the stored profile, seeding the default profile on first use.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Storage` if loading fails and
    /// `ProgressionError::Persistence` if the seed cannot be written.
    pub async fn open(
        repo: Arc<dyn ProfileRepository>,
        rules: ProgressionRules,
    ) -> Result<Self, ProgressionError> {
        let profile = match repo.load_profile().await? {
            Some(profile) => profile,
            None => {
                let seed = UserProfile::default();
                if let Err(source) = repo.save_profile(&seed).await {
                    return Err(ProgressionError::Persistence {
                        unwritten: Box::new(seed),
                        source,
                    });
                }
                tracing::info!("seeded default learner profile");
                seed
            }
        };

        let (changes, _) = watch::channel(profile.clone());
        Ok(Self {
            repo,
            rules,
            current: Mutex::new(profile),
            changes,
        })
    }

    #[must_use]
    pub fn rules(&self) -> ProgressionRules {
        self.rules
    }

    /// Current profile snapshot.
    pub async fn read(&self) -> UserProfile {
        self.current.lock().await.clone()
    }

    /// Receiver that yields the profile after every successful commit.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UserProfile> {
        self.changes.subscribe()
    }

    /// Record one completed lesson and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Persistence` carrying the computed profile
    /// if the write fails; the stored and cached profile are left unchanged.
    pub async fn complete_lesson(
        &self,
        lesson_id: LessonId,
        xp_gained: u64,
    ) -> Result<UserProfile, ProgressionError> {
        let mut current = self.current.lock().await;
        let next = current.complete_lesson(lesson_id, xp_gained, &self.rules);
        self.write(&mut current, next).await.inspect(|profile| {
            tracing::info!(
                lesson_id = %lesson_id,
                xp = profile.experience_points(),
                level = profile.level(),
                level_progress = profile.level_progress(),
                streak = profile.streak(),
                "lesson completion committed"
            );
        })
    }

    /// Persist a profile previously returned in `ProgressionError::Persistence`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Persistence` if the write fails again.
    pub async fn commit(&self, profile: UserProfile) -> Result<UserProfile, ProgressionError> {
        let mut current = self.current.lock().await;
        self.write(&mut current, profile).await
    }

    /// Restore and persist the default profile.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Persistence` if the write fails.
    pub async fn reset(&self) -> Result<UserProfile, ProgressionError> {
        let mut current = self.current.lock().await;
        self.write(&mut current, UserProfile::default()).await
    }

    async fn write(
        &self,
        current: &mut UserProfile,
        next: UserProfile,
    ) -> Result<UserProfile, ProgressionError> {
        if let Err(source) = self.repo.save_profile(&next).await {
            tracing::warn!(error = %source, "profile write failed");
            return Err(ProgressionError::Persistence {
                unwritten: Box::new(next),
                source,
            });
        }
        *current = next.clone();
        self.changes.send_replace(next.clone());
        Ok(next)
    }
}

impl std::fmt::Debug for ProgressionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionStore")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use storage::repository::{InMemoryRepository, StorageError};

    /// Wraps the in-memory repo and fails saves while `broken` is set.
    #[derive(Default)]
    struct FlakyRepo {
        inner: InMemoryRepository,
        broken: AtomicBool,
    }

    #[async_trait]
    impl ProfileRepository for FlakyRepo {
        async fn load_profile(&self) -> Result<Option<UserProfile>, StorageError> {
            self.inner.load_profile().await
        }

        async fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("disk unavailable".into()));
            }
            self.inner.save_profile(profile).await
        }
    }

    async fn open_store() -> (Arc<FlakyRepo>, ProgressionStore) {
        let repo = Arc::new(FlakyRepo::default());
        let store = ProgressionStore::open(repo.clone(), ProgressionRules::default())
            .await
            .unwrap();
        (repo, store)
    }

    #[tokio::test]
    async fn open_seeds_default_profile() {
        let (repo, store) = open_store().await;
        assert_eq!(store.read().await, UserProfile::default());
        assert_eq!(
            repo.load_profile().await.unwrap(),
            Some(UserProfile::default())
        );
    }

    #[tokio::test]
    async fn complete_lesson_persists_and_notifies() {
        let (repo, store) = open_store().await;
        let mut changes = store.subscribe();

        let next = store.complete_lesson(LessonId::new(1), 30).await.unwrap();
        assert_eq!(next.experience_points(), 1280);
        assert_eq!(next.level(), 5);
        assert_eq!(next.level_progress(), 71);
        assert_eq!(next.streak(), 6);

        assert_eq!(store.read().await, next);
        assert_eq!(repo.load_profile().await.unwrap(), Some(next.clone()));

        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow(), next);
    }

    #[tokio::test]
    async fn failed_write_leaves_profile_untouched() {
        let (repo, store) = open_store().await;
        repo.broken.store(true, Ordering::SeqCst);

        let err = store.complete_lesson(LessonId::new(1), 30).await.unwrap_err();
        let unwritten = err.unwritten().cloned().expect("computed profile returned");
        assert_eq!(unwritten.experience_points(), 1280);
        assert_eq!(store.read().await, UserProfile::default());

        repo.broken.store(false, Ordering::SeqCst);
        let committed = store.commit(unwritten.clone()).await.unwrap();
        assert_eq!(committed, unwritten);
        assert_eq!(store.read().await, unwritten);
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let (_repo, store) = open_store().await;
        store.complete_lesson(LessonId::new(2), 30).await.unwrap();
        let reset = store.reset().await.unwrap();
        assert_eq!(reset, UserProfile::default());
        assert!(!store.read().await.has_completed(LessonId::new(2)));
    }
}
