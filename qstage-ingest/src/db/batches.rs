//! Upload batch persistence

use super::{parse_opt_timestamp, parse_timestamp, parse_uuid};
use crate::models::{Batch, BatchStatus};
use qstage_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Insert a new batch
pub async fn save_batch(pool: &SqlitePool, batch: &Batch) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO upload_batches (
            batch_id, file_name, uploaded_by, uploaded_at, total_questions,
            questions_pending, questions_approved, questions_rejected,
            questions_duplicate, status, notes, reviewed_by,
            review_started_at, review_completed_at,
            import_started_at, import_completed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(batch.batch_id.to_string())
    .bind(&batch.file_name)
    .bind(&batch.uploaded_by)
    .bind(batch.uploaded_at.to_rfc3339())
    .bind(batch.total_questions)
    .bind(batch.questions_pending)
    .bind(batch.questions_approved)
    .bind(batch.questions_rejected)
    .bind(batch.questions_duplicate)
    .bind(batch.status.as_str())
    .bind(&batch.notes)
    .bind(&batch.reviewed_by)
    .bind(batch.review_started_at.map(|t| t.to_rfc3339()))
    .bind(batch.review_completed_at.map(|t| t.to_rfc3339()))
    .bind(batch.import_started_at.map(|t| t.to_rfc3339()))
    .bind(batch.import_completed_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a batch by id
pub async fn load_batch(pool: &SqlitePool, batch_id: Uuid) -> Result<Option<Batch>> {
    let row = sqlx::query("SELECT * FROM upload_batches WHERE batch_id = ?")
        .bind(batch_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(row_to_batch(&row)?)),
        None => Ok(None),
    }
}

/// Write back every mutable batch field
pub async fn update_batch(pool: &SqlitePool, batch: &Batch) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE upload_batches SET
            questions_pending = ?,
            questions_approved = ?,
            questions_rejected = ?,
            questions_duplicate = ?,
            status = ?,
            reviewed_by = ?,
            review_started_at = ?,
            review_completed_at = ?,
            import_started_at = ?,
            import_completed_at = ?
        WHERE batch_id = ?
        "#,
    )
    .bind(batch.questions_pending)
    .bind(batch.questions_approved)
    .bind(batch.questions_rejected)
    .bind(batch.questions_duplicate)
    .bind(batch.status.as_str())
    .bind(&batch.reviewed_by)
    .bind(batch.review_started_at.map(|t| t.to_rfc3339()))
    .bind(batch.review_completed_at.map(|t| t.to_rfc3339()))
    .bind(batch.import_started_at.map(|t| t.to_rfc3339()))
    .bind(batch.import_completed_at.map(|t| t.to_rfc3339()))
    .bind(batch.batch_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// List batches, newest first
pub async fn list_batches(pool: &SqlitePool, limit: i64) -> Result<Vec<Batch>> {
    let rows = sqlx::query("SELECT * FROM upload_batches ORDER BY uploaded_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_batch).collect()
}

fn row_to_batch(row: &SqliteRow) -> Result<Batch> {
    let batch_id: String = row.get("batch_id");
    let status: String = row.get("status");
    let uploaded_at: String = row.get("uploaded_at");

    Ok(Batch {
        batch_id: parse_uuid(&batch_id, "batch_id")?,
        file_name: row.get("file_name"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_at: parse_timestamp(&uploaded_at, "uploaded_at")?,
        total_questions: row.get("total_questions"),
        questions_pending: row.get("questions_pending"),
        questions_approved: row.get("questions_approved"),
        questions_rejected: row.get("questions_rejected"),
        questions_duplicate: row.get("questions_duplicate"),
        status: status.parse::<BatchStatus>()?,
        notes: row.get("notes"),
        reviewed_by: row.get("reviewed_by"),
        review_started_at: parse_opt_timestamp(row.get("review_started_at"), "review_started_at")?,
        review_completed_at: parse_opt_timestamp(row.get("review_completed_at"), "review_completed_at")?,
        import_started_at: parse_opt_timestamp(row.get("import_started_at"), "import_started_at")?,
        import_completed_at: parse_opt_timestamp(row.get("import_completed_at"), "import_completed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qstage_common::db::init::init_database;
    use std::path::PathBuf;

    async fn test_pool(name: &str) -> SqlitePool {
        let path = PathBuf::from(format!("/tmp/qstage-batch-{}-{}.db", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        init_database(&path).await.unwrap()
    }

    #[tokio::test]
    async fn batch_round_trips_through_store() {
        let pool = test_pool("roundtrip").await;
        let batch = Batch::new("dcf.md".into(), 12, "uploader@example.com".into(), Some("Q3 refresh".into()));
        save_batch(&pool, &batch).await.unwrap();

        let loaded = load_batch(&pool, batch.batch_id).await.unwrap().unwrap();
        assert_eq!(loaded.file_name, "dcf.md");
        assert_eq!(loaded.total_questions, 12);
        assert_eq!(loaded.questions_pending, 12);
        assert_eq!(loaded.status, BatchStatus::Pending);
        assert_eq!(loaded.notes.as_deref(), Some("Q3 refresh"));
        assert!(loaded.counters_consistent());
    }

    #[tokio::test]
    async fn missing_batch_loads_none() {
        let pool = test_pool("missing").await;
        assert!(load_batch(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_persists_counters_and_status() {
        let pool = test_pool("update").await;
        let mut batch = Batch::new("acc.md".into(), 3, "uploader".into(), None);
        save_batch(&pool, &batch).await.unwrap();

        batch.questions_pending = 1;
        batch.questions_approved = 2;
        batch.status = BatchStatus::Reviewing;
        batch.reviewed_by = Some("reviewer".into());
        batch.review_started_at = Some(chrono::Utc::now());
        update_batch(&pool, &batch).await.unwrap();

        let loaded = load_batch(&pool, batch.batch_id).await.unwrap().unwrap();
        assert_eq!(loaded.questions_approved, 2);
        assert_eq!(loaded.status, BatchStatus::Reviewing);
        assert!(loaded.review_started_at.is_some());
    }
}
