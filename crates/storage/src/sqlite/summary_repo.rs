use lesson_core::model::{LessonId, LessonSummary, SummaryId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_summary_row, ser, u64_to_i64};
use crate::repository::{LessonSummaryRepository, LessonSummaryRow, StorageError};

fn map_summary_row_with_id(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LessonSummaryRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let summary = map_summary_row(row)?;
    Ok(LessonSummaryRow::new(SummaryId::new(id), summary))
}

#[async_trait::async_trait]
impl LessonSummaryRepository for SqliteRepository {
    async fn append_summary(&self, summary: &LessonSummary) -> Result<SummaryId, StorageError> {
        let lesson_id = u64_to_i64("lesson_id", summary.lesson_id().value())?;
        let xp_gained = u64_to_i64("xp_gained", summary.xp_gained())?;

        let res = sqlx::query(
            r"
                INSERT INTO lesson_summaries (
                    lesson_id, started_at, completed_at, rounds,
                    correct, mistakes, hearts_left, xp_gained
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(lesson_id)
        .bind(summary.started_at())
        .bind(summary.completed_at())
        .bind(i64::from(summary.rounds()))
        .bind(i64::from(summary.correct()))
        .bind(i64::from(summary.mistakes()))
        .bind(i64::from(summary.hearts_left()))
        .bind(xp_gained)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(SummaryId::new(res.last_insert_rowid()))
    }

    async fn get_summary(&self, id: SummaryId) -> Result<LessonSummary, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    lesson_id, started_at, completed_at, rounds,
                    correct, mistakes, hearts_left, xp_gained
                FROM lesson_summaries
                WHERE id = ?1
            ",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_summary_row(&row)
    }

    async fn list_summaries(
        &self,
        lesson_id: Option<LessonId>,
        limit: u32,
    ) -> Result<Vec<LessonSummaryRow>, StorageError> {
        let mut sql = String::from(
            r"
                SELECT
                    id, lesson_id, started_at, completed_at, rounds,
                    correct, mistakes, hearts_left, xp_gained
                FROM lesson_summaries
            ",
        );

        let mut bind_index = 1;
        if lesson_id.is_some() {
            sql.push_str(" WHERE lesson_id = ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        sql.push_str(" ORDER BY completed_at DESC, id DESC");
        sql.push_str(" LIMIT ?");
        sql.push_str(&bind_index.to_string());

        let mut query = sqlx::query(&sql);
        if let Some(id) = lesson_id {
            query = query.bind(u64_to_i64("lesson_id", id.value())?);
        }
        query = query.bind(i64::from(limit));

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_summary_row_with_id(&row)?);
        }
        Ok(out)
    }
}
