//! Duplicate detection
//!
//! Similarity is a normalized edit-distance ratio over question text,
//! case-insensitive and whitespace-collapsed: symmetric, bounded [0, 1],
//! and exactly 1.0 for identical normalized text. A configurable threshold
//! selects reportable pairs, and matching pairs merge into connected
//! components so transitively linked questions share one cluster.
//!
//! The primary engine queries the store for candidates per subject. If the
//! primary path fails, detection falls back silently to a full in-process
//! pairwise scan with the identical metric and threshold; only the
//! fallback's own failure is fatal.

use qstage_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One question's text, keyed by its identifier
#[derive(Debug, Clone)]
pub struct QuestionText {
    pub question_id: String,
    pub question: String,
}

/// A pair of questions scoring at or above the threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub first_id: String,
    pub second_id: String,
    pub score: f64,
}

/// A connected component of questions transitively linked above threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCluster {
    /// Sorted for stable output
    pub question_ids: Vec<String>,
}

/// Lowercase and collapse whitespace runs to single spaces
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Similarity of two question texts after normalization
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Merge pairs into connected components with a union-find over ids
pub fn cluster_pairs(pairs: &[DuplicatePair]) -> Vec<DuplicateCluster> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut ids: Vec<&str> = Vec::new();
    for pair in pairs {
        for id in [pair.first_id.as_str(), pair.second_id.as_str()] {
            if !index.contains_key(id) {
                index.insert(id, ids.len());
                ids.push(id);
            }
        }
    }

    let mut parent: Vec<usize> = (0..ids.len()).collect();

    fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for pair in pairs {
        let a = find(&mut parent, index[pair.first_id.as_str()]);
        let b = find(&mut parent, index[pair.second_id.as_str()]);
        if a != b {
            parent[a] = b;
        }
    }

    let mut clusters: HashMap<usize, Vec<String>> = HashMap::new();
    for (i, id) in ids.iter().enumerate() {
        let root = find(&mut parent, i);
        clusters.entry(root).or_default().push((*id).to_string());
    }

    let mut out: Vec<DuplicateCluster> = clusters
        .into_values()
        .map(|mut question_ids| {
            question_ids.sort();
            DuplicateCluster { question_ids }
        })
        .collect();
    out.sort_by(|a, b| a.question_ids.cmp(&b.question_ids));
    out
}

/// All pairs at or above threshold from a pairwise scan of one corpus
pub fn pairwise_scan(corpus: &[QuestionText], threshold: f64) -> Vec<DuplicatePair> {
    let mut pairs = Vec::new();
    for i in 0..corpus.len() {
        for j in (i + 1)..corpus.len() {
            let score = similarity(&corpus[i].question, &corpus[j].question);
            if score >= threshold {
                pairs.push(DuplicatePair {
                    first_id: corpus[i].question_id.clone(),
                    second_id: corpus[j].question_id.clone(),
                    score,
                });
            }
        }
    }
    pairs
}

/// Store-backed duplicate detector over the committed corpus
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    pool: SqlitePool,
    threshold: f64,
    max_scan_corpus: i64,
}

impl DuplicateDetector {
    pub fn new(pool: SqlitePool, threshold: f64, max_scan_corpus: i64) -> Self {
        Self {
            pool,
            threshold,
            max_scan_corpus,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare the given subjects against the committed corpus.
    ///
    /// Primary path: per-subject candidate query narrowed by topic. On any
    /// primary failure, falls back to comparing subjects against the whole
    /// committed corpus in process. Returns pairs as (subject id, committed
    /// id, score).
    pub async fn detect_targeted(&self, subjects: &[QuestionText]) -> Result<Vec<DuplicatePair>> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        match self.detect_targeted_primary(subjects).await {
            Ok(pairs) => Ok(pairs),
            Err(e) => {
                warn!("Primary duplicate detection failed, using fallback scan: {}", e);
                self.detect_targeted_fallback(subjects).await
            }
        }
    }

    async fn detect_targeted_primary(&self, subjects: &[QuestionText]) -> Result<Vec<DuplicatePair>> {
        let mut pairs = Vec::new();
        for subject in subjects {
            // Candidates narrowed by topic keep the comparison set small;
            // cross-topic duplicates are the full scan's job
            let rows = sqlx::query(
                "SELECT q.question_id, q.question FROM questions q
                 JOIN staged_questions s ON s.question_id = ?
                 WHERE q.topic = s.topic",
            )
            .bind(&subject.question_id)
            .fetch_all(&self.pool)
            .await?;

            for row in &rows {
                let candidate_id: String = row.get("question_id");
                let candidate_text: String = row.get("question");
                let score = similarity(&subject.question, &candidate_text);
                if score >= self.threshold {
                    debug!(
                        staged_id = %subject.question_id,
                        existing_id = %candidate_id,
                        score,
                        "Duplicate candidate found"
                    );
                    pairs.push(DuplicatePair {
                        first_id: subject.question_id.clone(),
                        second_id: candidate_id,
                        score,
                    });
                }
            }
        }
        Ok(pairs)
    }

    /// Fallback: load the whole committed corpus once and compare in
    /// process. This path's failure is the only fatal one.
    async fn detect_targeted_fallback(&self, subjects: &[QuestionText]) -> Result<Vec<DuplicatePair>> {
        let corpus = self
            .load_committed_corpus()
            .await
            .map_err(|e| Error::DuplicateDetection(format!("fallback scan failed: {}", e)))?;

        let mut pairs = Vec::new();
        for subject in subjects {
            for candidate in &corpus {
                let score = similarity(&subject.question, &candidate.question);
                if score >= self.threshold {
                    pairs.push(DuplicatePair {
                        first_id: subject.question_id.clone(),
                        second_id: candidate.question_id.clone(),
                        score,
                    });
                }
            }
        }
        Ok(pairs)
    }

    /// Pairwise scan of the entire committed corpus, clustered.
    ///
    /// O(n²); refuses corpora above the configured ceiling instead of
    /// silently degrading.
    pub async fn scan_all(&self) -> Result<Vec<DuplicateCluster>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await?;
        if count > self.max_scan_corpus {
            return Err(Error::DuplicateDetection(format!(
                "corpus size {} exceeds full-scan ceiling {}",
                count, self.max_scan_corpus
            )));
        }

        let corpus = self.load_committed_corpus().await?;
        let pairs = pairwise_scan(&corpus, self.threshold);
        debug!(corpus = corpus.len(), pairs = pairs.len(), "Full-corpus duplicate scan complete");
        Ok(cluster_pairs(&pairs))
    }

    async fn load_committed_corpus(&self) -> Result<Vec<QuestionText>> {
        let rows = sqlx::query("SELECT question_id, question FROM questions ORDER BY question_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| QuestionText {
                question_id: row.get("question_id"),
                question: row.get("question"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_normalized_text_scores_one() {
        assert_eq!(similarity("What is WACC?", "what  is   wacc?"), 1.0);
        assert_eq!(similarity("A\tB\nC", "a b c"), 1.0);
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        let cases = [
            ("What is WACC?", "What's WACC?"),
            ("Walk me through a DCF.", "Explain terminal value."),
            ("", "nonempty"),
        ];
        for (a, b) in cases {
            let ab = similarity(a, b);
            let ba = similarity(b, a);
            assert!((ab - ba).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&ab));
        }
    }

    #[test]
    fn close_paraphrase_clears_the_scan_threshold() {
        let score = similarity("What is WACC?", "What's WACC?");
        assert!(score >= 0.8, "score was {}", score);
    }

    #[test]
    fn unrelated_questions_score_low() {
        let score = similarity(
            "Walk me through the three financial statements.",
            "What is WACC?",
        );
        assert!(score < 0.65, "score was {}", score);
    }

    #[test]
    fn clustering_is_transitive() {
        // A-B and B-C above threshold; A-C is not, but all three must land
        // in one cluster
        let pairs = vec![
            DuplicatePair {
                first_id: "A".into(),
                second_id: "B".into(),
                score: 0.9,
            },
            DuplicatePair {
                first_id: "B".into(),
                second_id: "C".into(),
                score: 0.9,
            },
        ];
        let clusters = cluster_pairs(&pairs);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].question_ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn disjoint_pairs_stay_separate() {
        let pairs = vec![
            DuplicatePair {
                first_id: "A".into(),
                second_id: "B".into(),
                score: 0.85,
            },
            DuplicatePair {
                first_id: "X".into(),
                second_id: "Y".into(),
                score: 0.95,
            },
        ];
        let clusters = cluster_pairs(&pairs);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn pairwise_scan_finds_only_threshold_pairs() {
        let corpus = vec![
            QuestionText {
                question_id: "1".into(),
                question: "What is WACC?".into(),
            },
            QuestionText {
                question_id: "2".into(),
                question: "What's WACC?".into(),
            },
            QuestionText {
                question_id: "3".into(),
                question: "Walk me through the three financial statements.".into(),
            },
        ];
        let pairs = pairwise_scan(&corpus, 0.8);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].first_id, "1");
        assert_eq!(pairs[0].second_id, "2");
        assert!(pairs[0].score >= 0.8);
    }

    #[test]
    fn empty_corpus_scans_clean() {
        assert!(pairwise_scan(&[], 0.8).is_empty());
        assert!(cluster_pairs(&[]).is_empty());
    }
}
