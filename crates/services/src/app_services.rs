use std::sync::Arc;

use lesson_core::model::LessonCatalog;
use storage::repository::Storage;

use crate::Clock;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::lessons::{LessonHistoryService, LessonLoopService};
use crate::oracle::RecognitionOracle;
use crate::progression::ProgressionStore;

/// Assembles the lesson loop, progression store and history over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    config: EngineConfig,
    progression: Arc<ProgressionStore>,
    lesson_loop: Arc<LessonLoopService>,
    history: Arc<LessonHistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the config is invalid, storage cannot be
    /// initialized, or the profile cannot be loaded.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: EngineConfig,
        oracle: Arc<dyn RecognitionOracle>,
    ) -> Result<Self, AppServicesError> {
        config.validate()?;
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, config, oracle).await
    }

    /// Build services over volatile in-memory repositories.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the config is invalid.
    pub async fn in_memory(
        clock: Clock,
        config: EngineConfig,
        oracle: Arc<dyn RecognitionOracle>,
    ) -> Result<Self, AppServicesError> {
        config.validate()?;
        Self::from_storage(Storage::in_memory(), clock, config, oracle).await
    }

    async fn from_storage(
        storage: Storage,
        clock: Clock,
        config: EngineConfig,
        oracle: Arc<dyn RecognitionOracle>,
    ) -> Result<Self, AppServicesError> {
        let catalog = Arc::new(LessonCatalog::builtin()?);
        let progression =
            Arc::new(ProgressionStore::open(Arc::clone(&storage.profiles), config.rules()).await?);
        let lesson_loop = Arc::new(
            LessonLoopService::new(
                clock,
                catalog,
                oracle,
                Arc::clone(&progression),
                Arc::clone(&storage.summaries),
            )
            .with_config(config.clone()),
        );
        let history = Arc::new(LessonHistoryService::new(
            clock,
            Arc::clone(&storage.summaries),
        ));

        Ok(Self {
            config,
            progression,
            lesson_loop,
            history,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn progression(&self) -> Arc<ProgressionStore> {
        Arc::clone(&self.progression)
    }

    #[must_use]
    pub fn lesson_loop(&self) -> Arc<LessonLoopService> {
        Arc::clone(&self.lesson_loop)
    }

    #[must_use]
    pub fn history(&self) -> Arc<LessonHistoryService> {
        Arc::clone(&self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::oracle::{OraclePolicy, ScriptedOracle};
    use lesson_core::time::fixed_clock;

    #[tokio::test]
    async fn in_memory_services_start_from_default_profile() {
        let oracle = Arc::new(ScriptedOracle::new(OraclePolicy::AlwaysPass));
        let services = AppServices::in_memory(fixed_clock(), EngineConfig::default(), oracle)
            .await
            .unwrap();

        let profile = services.progression().read().await;
        assert_eq!(profile.experience_points(), 1250);
        assert_eq!(services.lesson_loop().catalog().lessons().count(), 2);
    }

    #[tokio::test]
    async fn rejects_zero_hearts_before_touching_storage() {
        let oracle = Arc::new(ScriptedOracle::new(OraclePolicy::AlwaysPass));
        let config = EngineConfig {
            starting_hearts: 0,
            ..EngineConfig::default()
        };
        let err = AppServices::in_memory(fixed_clock(), config, oracle)
            .await
            .err();
        assert!(matches!(
            err,
            Some(AppServicesError::Config(ConfigError::ZeroHearts))
        ));
    }
}
