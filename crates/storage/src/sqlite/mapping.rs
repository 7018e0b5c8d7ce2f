use lesson_core::model::{LessonId, LessonSummary};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn map_summary_row(row: &sqlx::sqlite::SqliteRow) -> Result<LessonSummary, StorageError> {
    let lesson_id = lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?;
    let rounds = u32_from_i64("rounds", row.try_get::<i64, _>("rounds").map_err(ser)?)?;
    let correct = u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?;
    let mistakes = u32_from_i64("mistakes", row.try_get::<i64, _>("mistakes").map_err(ser)?)?;
    let hearts_left = u32_from_i64(
        "hearts_left",
        row.try_get::<i64, _>("hearts_left").map_err(ser)?,
    )?;
    let xp_gained = i64_to_u64("xp_gained", row.try_get::<i64, _>("xp_gained").map_err(ser)?)?;

    LessonSummary::new(
        lesson_id,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        rounds,
        correct,
        mistakes,
        hearts_left,
        xp_gained,
    )
    .map_err(ser)
}
