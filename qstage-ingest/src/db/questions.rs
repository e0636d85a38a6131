//! Committed question store operations

use crate::models::{CommittedQuestion, StagedQuestion};
use qstage_common::Result;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool};

/// Copy a staged question's content and id into the committed store.
///
/// Executor-generic so a Replace import can pair the delete and insert in
/// one transaction.
pub async fn insert_from_staged<'e, E>(executor: E, staged: &StagedQuestion) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO questions (
            question_id, topic, subtopic, difficulty, question_type,
            question, answer, notes_for_tutor, uploaded_by, uploaded_on,
            upload_notes
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&staged.question_id)
    .bind(&staged.topic)
    .bind(&staged.subtopic)
    .bind(&staged.difficulty)
    .bind(&staged.question_type)
    .bind(&staged.question)
    .bind(&staged.answer)
    .bind(&staged.notes_for_tutor)
    .bind(&staged.uploaded_by)
    .bind(&staged.uploaded_on)
    .bind(&staged.upload_notes)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load a committed question by id
pub async fn load_question(pool: &SqlitePool, question_id: &str) -> Result<Option<CommittedQuestion>> {
    let row = sqlx::query("SELECT * FROM questions WHERE question_id = ?")
        .bind(question_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(row_to_question(&row))),
        None => Ok(None),
    }
}

/// Delete a committed question; true when a row was removed
pub async fn delete_question<'e, E>(executor: E, question_id: &str) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM questions WHERE question_id = ?")
        .bind(question_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_questions(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn row_to_question(row: &SqliteRow) -> CommittedQuestion {
    CommittedQuestion {
        question_id: row.get("question_id"),
        topic: row.get("topic"),
        subtopic: row.get("subtopic"),
        difficulty: row.get("difficulty"),
        question_type: row.get("question_type"),
        question: row.get("question"),
        answer: row.get("answer"),
        notes_for_tutor: row.get("notes_for_tutor"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_on: row.get("uploaded_on"),
        upload_notes: row.get("upload_notes"),
        updated_at: row.get("updated_at"),
    }
}
