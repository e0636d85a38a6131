//! Full-corpus duplicate scan tests

use qstage_common::db::init::init_database;
use qstage_common::Error;
use qstage_ingest::dedup::{DuplicateDetector, QuestionText};
use sqlx::SqlitePool;
use std::path::PathBuf;

async fn pool_with_corpus(name: &str, questions: &[(&str, &str)]) -> SqlitePool {
    let path = PathBuf::from(format!("/tmp/qstage-scan-{}-{}.db", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    let pool = init_database(&path).await.unwrap();

    for (id, text) in questions {
        sqlx::query(
            "INSERT INTO questions (question_id, topic, subtopic, difficulty, question_type, question, answer)
             VALUES (?, 'DCF', 'WACC', 'Basic', 'Question', ?, 'A.')",
        )
        .bind(id)
        .bind(text)
        .execute(&pool)
        .await
        .unwrap();
    }
    pool
}

#[tokio::test]
async fn full_scan_clusters_similar_committed_questions() {
    let pool = pool_with_corpus(
        "clusters",
        &[
            ("DCF-WACC-B-Q-001", "What is WACC?"),
            ("DCF-WACC-B-Q-002", "What's WACC?"),
            ("DCF-WACC-B-Q-003", "Walk me through the three financial statements."),
        ],
    )
    .await;

    let detector = DuplicateDetector::new(pool, 0.8, 5000);
    let clusters = detector.scan_all().await.unwrap();

    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].question_ids, vec!["DCF-WACC-B-Q-001", "DCF-WACC-B-Q-002"]);
}

#[tokio::test]
async fn full_scan_refuses_oversized_corpus() {
    let pool = pool_with_corpus(
        "ceiling",
        &[
            ("DCF-WACC-B-Q-001", "Question one?"),
            ("DCF-WACC-B-Q-002", "Question two?"),
            ("DCF-WACC-B-Q-003", "Question three?"),
        ],
    )
    .await;

    let detector = DuplicateDetector::new(pool, 0.8, 2);
    let err = detector.scan_all().await.unwrap_err();
    assert!(matches!(err, Error::DuplicateDetection(_)));
}

#[tokio::test]
async fn targeted_detection_falls_back_when_primary_query_fails() {
    let pool = pool_with_corpus("fallback", &[("DCF-WACC-B-Q-001", "What is WACC?")]).await;

    // Breaking the staged_questions table kills the store-backed candidate
    // query; the in-process scan should still find the committed match
    sqlx::query("DROP TABLE staged_questions")
        .execute(&pool)
        .await
        .unwrap();

    let detector = DuplicateDetector::new(pool, 0.8, 5000);
    let subjects = vec![QuestionText {
        question_id: "DCF-WACC-B-Q-900".to_string(),
        question: "What's WACC?".to_string(),
    }];
    let pairs = detector.detect_targeted(&subjects).await.unwrap();

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].first_id, "DCF-WACC-B-Q-900");
    assert_eq!(pairs[0].second_id, "DCF-WACC-B-Q-001");
    assert!(pairs[0].score >= 0.8);
}

#[tokio::test]
async fn targeted_detection_fails_when_fallback_also_fails() {
    let pool = pool_with_corpus("no-fallback", &[]).await;

    // With both stores gone the fallback cannot load the corpus either
    sqlx::query("DROP TABLE staged_questions").execute(&pool).await.unwrap();
    sqlx::query("DROP TABLE questions").execute(&pool).await.unwrap();

    let detector = DuplicateDetector::new(pool, 0.8, 5000);
    let subjects = vec![QuestionText {
        question_id: "DCF-WACC-B-Q-900".to_string(),
        question: "What's WACC?".to_string(),
    }];
    let err = detector.detect_targeted(&subjects).await.unwrap_err();

    assert!(matches!(err, Error::DuplicateDetection(_)));
}

#[tokio::test]
async fn clean_corpus_yields_no_clusters() {
    let pool = pool_with_corpus(
        "clean",
        &[
            ("DCF-WACC-B-Q-001", "What is WACC?"),
            ("DCF-TV-B-Q-001", "How do you calculate terminal value?"),
        ],
    )
    .await;

    let detector = DuplicateDetector::new(pool, 0.8, 5000);
    assert!(detector.scan_all().await.unwrap().is_empty());
}
