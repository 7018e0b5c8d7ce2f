use async_trait::async_trait;
use chrono::Utc;
use lesson_core::model::UserProfile;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, i64_to_u64, lesson_id_from_i64, ser, u32_from_i64, u64_to_i64};
use crate::repository::{ProfileRepository, StorageError};

const PROFILE_ROW_ID: i64 = 1;

#[async_trait]
impl ProfileRepository for SqliteRepository {
    async fn load_profile(&self) -> Result<Option<UserProfile>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT name, experience_points, level, level_progress, streak
            FROM profile
            WHERE id = ?1
            ",
        )
        .bind(PROFILE_ROW_ID)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lesson_rows = sqlx::query(
            r"
            SELECT lesson_id
            FROM profile_completed_lessons
            WHERE profile_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(PROFILE_ROW_ID)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut completed = Vec::with_capacity(lesson_rows.len());
        for lesson_row in lesson_rows {
            completed.push(lesson_id_from_i64(
                lesson_row.try_get::<i64, _>("lesson_id").map_err(ser)?,
            )?);
        }

        let name: String = row.try_get("name").map_err(ser)?;
        let experience_points = i64_to_u64(
            "experience_points",
            row.try_get::<i64, _>("experience_points").map_err(ser)?,
        )?;
        let level = u32_from_i64("level", row.try_get::<i64, _>("level").map_err(ser)?)?;
        let level_progress = u32_from_i64(
            "level_progress",
            row.try_get::<i64, _>("level_progress").map_err(ser)?,
        )?;
        let streak = u32_from_i64("streak", row.try_get::<i64, _>("streak").map_err(ser)?)?;

        UserProfile::from_persisted(
            name,
            experience_points,
            level,
            level_progress,
            streak,
            completed,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let experience_points = u64_to_i64("experience_points", profile.experience_points())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO profile (
                id, name, experience_points, level, level_progress, streak, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                experience_points = excluded.experience_points,
                level = excluded.level,
                level_progress = excluded.level_progress,
                streak = excluded.streak,
                updated_at = excluded.updated_at
            ",
        )
        .bind(PROFILE_ROW_ID)
        .bind(profile.name())
        .bind(experience_points)
        .bind(i64::from(profile.level()))
        .bind(i64::from(profile.level_progress()))
        .bind(i64::from(profile.streak()))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM profile_completed_lessons WHERE profile_id = ?1")
            .bind(PROFILE_ROW_ID)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, lesson_id) in profile.completed_lesson_ids().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                INSERT INTO profile_completed_lessons (profile_id, lesson_id, position)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(PROFILE_ROW_ID)
            .bind(u64_to_i64("lesson_id", lesson_id.value())?)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
