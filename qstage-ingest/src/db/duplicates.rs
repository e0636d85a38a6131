//! Duplicate record persistence

use super::{parse_opt_timestamp, parse_timestamp, parse_uuid};
use crate::models::{DuplicateRecord, DuplicateResolution};
use chrono::Utc;
use qstage_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Record one detected staged-vs-committed match
pub async fn save_duplicate(pool: &SqlitePool, record: &DuplicateRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO staging_duplicates (
            duplicate_id, staged_question_id, existing_question_id,
            similarity_score, resolution, resolution_notes, resolved_by,
            resolved_at, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.duplicate_id.to_string())
    .bind(&record.staged_question_id)
    .bind(&record.existing_question_id)
    .bind(record.similarity_score)
    .bind(record.resolution.as_str())
    .bind(&record.resolution_notes)
    .bind(&record.resolved_by)
    .bind(record.resolved_at.map(|t| t.to_rfc3339()))
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a duplicate record by id
pub async fn load_duplicate(pool: &SqlitePool, duplicate_id: Uuid) -> Result<Option<DuplicateRecord>> {
    let row = sqlx::query("SELECT * FROM staging_duplicates WHERE duplicate_id = ?")
        .bind(duplicate_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(row_to_duplicate(&row)?)),
        None => Ok(None),
    }
}

/// All duplicate records pointing at one staged question
pub async fn load_duplicates_for_staged(
    pool: &SqlitePool,
    staged_question_id: &str,
) -> Result<Vec<DuplicateRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM staging_duplicates WHERE staged_question_id = ? ORDER BY created_at",
    )
    .bind(staged_question_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_duplicate).collect()
}

/// Apply a reviewer's resolution to a duplicate record
pub async fn update_resolution(
    pool: &SqlitePool,
    duplicate_id: Uuid,
    resolution: DuplicateResolution,
    resolution_notes: Option<&str>,
    resolved_by: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE staging_duplicates
         SET resolution = ?, resolution_notes = ?, resolved_by = ?, resolved_at = ?
         WHERE duplicate_id = ?",
    )
    .bind(resolution.as_str())
    .bind(resolution_notes)
    .bind(resolved_by)
    .bind(Utc::now().to_rfc3339())
    .bind(duplicate_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_duplicate(row: &SqliteRow) -> Result<DuplicateRecord> {
    let duplicate_id: String = row.get("duplicate_id");
    let resolution: String = row.get("resolution");
    let created_at: String = row.get("created_at");

    Ok(DuplicateRecord {
        duplicate_id: parse_uuid(&duplicate_id, "duplicate_id")?,
        staged_question_id: row.get("staged_question_id"),
        existing_question_id: row.get("existing_question_id"),
        similarity_score: row.get("similarity_score"),
        resolution: resolution.parse::<DuplicateResolution>()?,
        resolution_notes: row.get("resolution_notes"),
        resolved_by: row.get("resolved_by"),
        resolved_at: parse_opt_timestamp(row.get("resolved_at"), "resolved_at")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}
