//! Database initialization
//!
//! Creates the four staging pipeline tables on first run. Identifier
//! uniqueness is ultimately enforced here: `question_id` is the primary key
//! of both the staged and the committed store, so a write-time conflict
//! surfaces as a UNIQUE violation the caller retries against.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer. Concurrent batch
    // uploads only contend on identifier sequencing, which is resolved by
    // retry-on-conflict rather than locking.
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Idempotent - safe to call multiple times
    create_upload_batches_table(&pool).await?;
    create_staged_questions_table(&pool).await?;
    create_questions_table(&pool).await?;
    create_staging_duplicates_table(&pool).await?;

    Ok(pool)
}

/// Create the upload_batches table
///
/// One row per bulk upload. Batches are never hard-deleted; cancellation is
/// a status write.
pub async fn create_upload_batches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_batches (
            batch_id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            uploaded_at TEXT NOT NULL,
            total_questions INTEGER NOT NULL,
            questions_pending INTEGER NOT NULL DEFAULT 0,
            questions_approved INTEGER NOT NULL DEFAULT 0,
            questions_rejected INTEGER NOT NULL DEFAULT 0,
            questions_duplicate INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            notes TEXT,
            reviewed_by TEXT,
            review_started_at TEXT,
            review_completed_at TEXT,
            import_started_at TEXT,
            import_completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the staged_questions table
///
/// Holding area for questions awaiting review. The primary key doubles as
/// the uniqueness constraint the sequence allocator retries against.
pub async fn create_staged_questions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staged_questions (
            question_id TEXT PRIMARY KEY,
            upload_batch_id TEXT NOT NULL REFERENCES upload_batches(batch_id),
            topic TEXT NOT NULL,
            subtopic TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            question_type TEXT NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            notes_for_tutor TEXT,
            status TEXT NOT NULL,
            duplicate_of TEXT,
            similarity_score REAL,
            review_notes TEXT,
            reviewed_by TEXT,
            reviewed_at TEXT,
            created_at TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            uploaded_on TEXT NOT NULL,
            upload_notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_staged_questions_batch
         ON staged_questions(upload_batch_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the questions table (the committed, authoritative store)
pub async fn create_questions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            question_id TEXT PRIMARY KEY,
            topic TEXT NOT NULL,
            subtopic TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            question_type TEXT NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            notes_for_tutor TEXT,
            uploaded_by TEXT,
            uploaded_on TEXT,
            upload_notes TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_questions_topic
         ON questions(topic, subtopic)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the staging_duplicates table
///
/// One row per detected staged-vs-committed match, mutated only by
/// reviewer resolution.
pub async fn create_staging_duplicates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staging_duplicates (
            duplicate_id TEXT PRIMARY KEY,
            staged_question_id TEXT NOT NULL REFERENCES staged_questions(question_id),
            existing_question_id TEXT NOT NULL,
            similarity_score REAL NOT NULL,
            resolution TEXT NOT NULL,
            resolution_notes TEXT,
            resolved_by TEXT,
            resolved_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
