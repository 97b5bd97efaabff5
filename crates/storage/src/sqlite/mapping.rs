use assess_core::model::{
    Provenance, QuestionGrade, QuestionId, QuizId, SessionId, SubmissionResult,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn db<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn parse_provenance(s: &str) -> Result<Provenance, StorageError> {
    Provenance::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid provenance: {s}")))
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<SubmissionResult, StorageError> {
    let session_id: SessionId = row
        .try_get::<String, _>("session_id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let quiz_id = quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?;
    let points_earned =
        u32_from_i64("points_earned", row.try_get::<i64, _>("points_earned").map_err(ser)?)?;
    let points_possible = u32_from_i64(
        "points_possible",
        row.try_get::<i64, _>("points_possible").map_err(ser)?,
    )?;
    let questions: Vec<QuestionGrade> =
        serde_json::from_str(&row.try_get::<String, _>("questions").map_err(ser)?).map_err(ser)?;
    let incident_count = u32_from_i64(
        "incident_count",
        row.try_get::<i64, _>("incident_count").map_err(ser)?,
    )?;
    let elapsed_seconds =
        i64_to_u64("elapsed_seconds", row.try_get::<i64, _>("elapsed_seconds").map_err(ser)?)?;
    let provenance = parse_provenance(&row.try_get::<String, _>("provenance").map_err(ser)?)?;

    Ok(SubmissionResult {
        session_id,
        quiz_id,
        points_earned,
        points_possible,
        questions,
        incident_count,
        elapsed_seconds,
        provenance,
        expired: row.try_get::<bool, _>("expired").map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}
