//! Staged question persistence

use super::{parse_opt_timestamp, parse_timestamp, parse_uuid};
use crate::models::{QuestionStatus, StagedQuestion};
use chrono::Utc;
use qstage_common::Result;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use uuid::Uuid;

/// Insert one staged question.
///
/// Takes any executor so staging can batch inserts inside one transaction;
/// a UNIQUE violation on `question_id` is the caller's retry signal.
pub async fn insert_staged_question<'e, E>(executor: E, question: &StagedQuestion) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO staged_questions (
            question_id, upload_batch_id, topic, subtopic, difficulty,
            question_type, question, answer, notes_for_tutor, status,
            duplicate_of, similarity_score, review_notes, reviewed_by,
            reviewed_at, created_at, uploaded_by, uploaded_on, upload_notes
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&question.question_id)
    .bind(question.upload_batch_id.to_string())
    .bind(&question.topic)
    .bind(&question.subtopic)
    .bind(&question.difficulty)
    .bind(&question.question_type)
    .bind(&question.question)
    .bind(&question.answer)
    .bind(&question.notes_for_tutor)
    .bind(question.status.as_str())
    .bind(&question.duplicate_of)
    .bind(question.similarity_score)
    .bind(&question.review_notes)
    .bind(&question.reviewed_by)
    .bind(question.reviewed_at.map(|t| t.to_rfc3339()))
    .bind(question.created_at.to_rfc3339())
    .bind(&question.uploaded_by)
    .bind(&question.uploaded_on)
    .bind(&question.upload_notes)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load one staged question by id
pub async fn load_staged_question(pool: &SqlitePool, question_id: &str) -> Result<Option<StagedQuestion>> {
    let row = sqlx::query("SELECT * FROM staged_questions WHERE question_id = ?")
        .bind(question_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(row_to_staged(&row)?)),
        None => Ok(None),
    }
}

/// Load a batch's questions, optionally filtered by status, in id order
pub async fn load_batch_questions(
    pool: &SqlitePool,
    batch_id: Uuid,
    status: Option<QuestionStatus>,
) -> Result<Vec<StagedQuestion>> {
    let rows = match status {
        Some(status) => {
            sqlx::query(
                "SELECT * FROM staged_questions
                 WHERE upload_batch_id = ? AND status = ?
                 ORDER BY question_id",
            )
            .bind(batch_id.to_string())
            .bind(status.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT * FROM staged_questions
                 WHERE upload_batch_id = ?
                 ORDER BY question_id",
            )
            .bind(batch_id.to_string())
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(row_to_staged).collect()
}

/// Set a question's status and record who acted
pub async fn update_question_status(
    pool: &SqlitePool,
    question_id: &str,
    status: QuestionStatus,
    reviewed_by: &str,
    review_notes: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE staged_questions
         SET status = ?, reviewed_by = ?, review_notes = ?, reviewed_at = ?
         WHERE question_id = ?",
    )
    .bind(status.as_str())
    .bind(reviewed_by)
    .bind(review_notes)
    .bind(Utc::now().to_rfc3339())
    .bind(question_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set status only, leaving review fields untouched
pub async fn set_status(pool: &SqlitePool, question_id: &str, status: QuestionStatus) -> Result<()> {
    sqlx::query("UPDATE staged_questions SET status = ? WHERE question_id = ?")
        .bind(status.as_str())
        .bind(question_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Mark a staged question as a duplicate of a committed one
pub async fn mark_duplicate(
    pool: &SqlitePool,
    question_id: &str,
    existing_question_id: &str,
    similarity_score: f64,
) -> Result<()> {
    sqlx::query(
        "UPDATE staged_questions
         SET status = ?, duplicate_of = ?, similarity_score = ?
         WHERE question_id = ?",
    )
    .bind(QuestionStatus::Duplicate.as_str())
    .bind(existing_question_id)
    .bind(similarity_score)
    .bind(question_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove the duplicate link (KeepBoth resolution)
pub async fn clear_duplicate_link(pool: &SqlitePool, question_id: &str) -> Result<()> {
    sqlx::query(
        "UPDATE staged_questions
         SET duplicate_of = NULL, similarity_score = NULL
         WHERE question_id = ?",
    )
    .bind(question_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-status counts for one batch.
///
/// Imported rows count toward approved so the batch counter invariant
/// (pending + approved + rejected + duplicate == total) holds after import.
pub async fn status_counts(pool: &SqlitePool, batch_id: Uuid) -> Result<StatusCounts> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) as n FROM staged_questions
         WHERE upload_batch_id = ? GROUP BY status",
    )
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for row in &rows {
        let status: String = row.get("status");
        let n: i64 = row.get("n");
        match status.parse::<QuestionStatus>()? {
            QuestionStatus::Pending => counts.pending += n,
            QuestionStatus::Approved | QuestionStatus::Imported => counts.approved += n,
            QuestionStatus::Rejected => counts.rejected += n,
            QuestionStatus::Duplicate => counts.duplicate += n,
        }
    }
    Ok(counts)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub duplicate: i64,
}

fn row_to_staged(row: &SqliteRow) -> Result<StagedQuestion> {
    let upload_batch_id: String = row.get("upload_batch_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");

    Ok(StagedQuestion {
        question_id: row.get("question_id"),
        upload_batch_id: parse_uuid(&upload_batch_id, "upload_batch_id")?,
        topic: row.get("topic"),
        subtopic: row.get("subtopic"),
        difficulty: row.get("difficulty"),
        question_type: row.get("question_type"),
        question: row.get("question"),
        answer: row.get("answer"),
        notes_for_tutor: row.get("notes_for_tutor"),
        status: status.parse::<QuestionStatus>()?,
        duplicate_of: row.get("duplicate_of"),
        similarity_score: row.get("similarity_score"),
        review_notes: row.get("review_notes"),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: parse_opt_timestamp(row.get("reviewed_at"), "reviewed_at")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        uploaded_by: row.get("uploaded_by"),
        uploaded_on: row.get("uploaded_on"),
        upload_notes: row.get("upload_notes"),
    })
}
