//! Tests for database initialization
//!
//! Covers automatic database creation, idempotent re-initialization, and
//! the uniqueness constraints the identifier allocator relies on.

use qstage_common::db::init::init_database;
use std::path::PathBuf;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let test_db = format!("/tmp/qstage-test-db-{}.db", std::process::id());
    let db_path = PathBuf::from(&test_db);

    let _ = std::fs::remove_file(&db_path);

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_database_opens_existing() {
    let test_db = format!("/tmp/qstage-test-db-existing-{}.db", std::process::id());
    let db_path = PathBuf::from(&test_db);

    let _ = std::fs::remove_file(&db_path);

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Second open should succeed (idempotent schema creation)
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    drop(pool1);
    drop(pool2);
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_all_tables_created() {
    let test_db = format!("/tmp/qstage-test-db-tables-{}.db", std::process::id());
    let db_path = PathBuf::from(&test_db);
    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.expect("init failed");

    for table in [
        "upload_batches",
        "staged_questions",
        "questions",
        "staging_duplicates",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("schema query failed");
        assert_eq!(count, 1, "missing table: {}", table);
    }

    drop(pool);
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_question_id_unique_in_both_stores() {
    let test_db = format!("/tmp/qstage-test-db-unique-{}.db", std::process::id());
    let db_path = PathBuf::from(&test_db);
    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.expect("init failed");

    sqlx::query(
        "INSERT INTO questions (question_id, topic, subtopic, difficulty, question_type, question, answer)
         VALUES ('DCF-WACC-B-Q-001', 'DCF', 'WACC', 'Basic', 'Question', 'q', 'a')",
    )
    .execute(&pool)
    .await
    .expect("first insert failed");

    // Duplicate primary key must be rejected by the store
    let dup = sqlx::query(
        "INSERT INTO questions (question_id, topic, subtopic, difficulty, question_type, question, answer)
         VALUES ('DCF-WACC-B-Q-001', 'DCF', 'WACC', 'Basic', 'Question', 'q2', 'a2')",
    )
    .execute(&pool)
    .await;

    match dup {
        Err(sqlx::Error::Database(db_err)) => assert!(db_err.is_unique_violation()),
        other => panic!("expected unique violation, got {:?}", other),
    }

    drop(pool);
    let _ = std::fs::remove_file(&db_path);
}
