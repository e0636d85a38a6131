//! Semantic question identifiers
//!
//! Ids follow `{TOPIC}-{SUBTOPIC}-{DIFFICULTY}-{TYPE}-{SEQ:03}`, e.g.
//! `DCF-WACC-B-Q-001`. Topic and subtopic codes are derived from the full
//! names by known-term lookup, parenthetical abbreviation, or initials of
//! significant words. The type-code vocabulary has changed over the corpus's
//! life, so it lives in configuration rather than a hardcoded table.
//!
//! Sequence numbers are per exact base prefix and unique across the staged
//! and committed stores combined. [`SequenceAllocator`] proposes max+1 from
//! a store read; the store's UNIQUE constraint is the final arbiter, and
//! callers retry on write-time conflict.

use qstage_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

/// Code assigned to placeholder subtopics that carry no real meaning
pub const SENTINEL_SUBTOPIC_CODE: &str = "GEN";

const PLACEHOLDER_SUBTOPICS: [&str; 4] = ["undefined", "unknown", "general", "misc"];

/// Words skipped when building initials from a multi-word name
const STOPWORDS: [&str; 9] = ["the", "and", "of", "for", "to", "in", "on", "at", "by"];

/// Code tables for identifier generation, supplied via configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    /// Question type to code, e.g. Question → Q
    #[serde(default = "default_type_codes")]
    pub type_codes: HashMap<String, String>,

    /// Code used when a type is absent from `type_codes`
    #[serde(default = "default_fallback_type_code")]
    pub fallback_type_code: String,

    /// Exact topic names with fixed codes, checked before derivation
    #[serde(default = "default_known_topics")]
    pub known_topics: HashMap<String, String>,

    /// Exact subtopic names with fixed codes
    #[serde(default)]
    pub known_subtopics: HashMap<String, String>,

    #[serde(default = "default_topic_width")]
    pub topic_width: usize,

    #[serde(default = "default_subtopic_width")]
    pub subtopic_width: usize,
}

fn default_type_codes() -> HashMap<String, String> {
    // Current two-code scheme: conceptual types share Q, quantitative share P
    [
        ("Question", "Q"),
        ("Definition", "Q"),
        ("GenConcept", "Q"),
        ("Analysis", "Q"),
        ("Problem", "P"),
        ("Calculation", "P"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_fallback_type_code() -> String {
    "Q".to_string()
}

fn default_known_topics() -> HashMap<String, String> {
    [("Accounting", "ACC")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_topic_width() -> usize {
    10
}

fn default_subtopic_width() -> usize {
    8
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            type_codes: default_type_codes(),
            fallback_type_code: default_fallback_type_code(),
            known_topics: default_known_topics(),
            known_subtopics: HashMap::new(),
            topic_width: default_topic_width(),
            subtopic_width: default_subtopic_width(),
        }
    }
}

impl IdConfig {
    /// The older five-letter type scheme, for corpora that predate the
    /// two-code consolidation
    pub fn legacy() -> Self {
        Self {
            type_codes: [
                ("GenConcept", "G"),
                ("Problem", "P"),
                ("Definition", "D"),
                ("Calculation", "C"),
                ("Analysis", "A"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            fallback_type_code: "G".to_string(),
            ..Self::default()
        }
    }
}

/// Derives base ids (everything before the sequence) from question fields
#[derive(Debug, Clone)]
pub struct IdGenerator {
    config: IdConfig,
}

impl IdGenerator {
    pub fn new(config: IdConfig) -> Self {
        Self { config }
    }

    /// Base id without sequence, e.g. `DCF-WACC-B-Q`
    pub fn base_id(&self, topic: &str, subtopic: &str, difficulty: &str, question_type: &str) -> String {
        format!(
            "{}-{}-{}-{}",
            self.topic_code(topic),
            self.subtopic_code(subtopic),
            difficulty_code(difficulty),
            self.type_code(question_type)
        )
    }

    /// Topic code: known term, then parenthetical abbreviation, then
    /// initials of significant words
    pub fn topic_code(&self, topic: &str) -> String {
        let topic = topic.trim();
        let width = self.config.topic_width;

        if let Some(code) = self.config.known_topics.get(topic) {
            return truncate_upper(code, width);
        }

        // "Discounted Cash Flow (DCF)" carries its own abbreviation
        if let Some(abbrev) = parenthetical_abbreviation(topic, width) {
            return abbrev;
        }

        let without_parens = strip_parentheticals(topic);
        let cleaned = keep_alphanumeric_words(&without_parens);
        let words: Vec<&str> = cleaned.split_whitespace().collect();

        let significant: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(&w.to_lowercase().as_str()))
            .collect();
        let significant = if significant.is_empty() { words } else { significant };

        match significant.len() {
            0 => SENTINEL_SUBTOPIC_CODE.to_string(),
            1 => truncate_upper(significant[0], width),
            _ => {
                let initials: String = significant
                    .iter()
                    .take(4)
                    .filter_map(|w| w.chars().next())
                    .map(|c| c.to_ascii_uppercase())
                    .collect();
                if initials.chars().count() < 3 {
                    truncate_upper(significant[0], width.min(4))
                } else {
                    truncate_upper(&initials, width)
                }
            }
        }
    }

    /// Subtopic code: sentinel for placeholders, then known term, then an
    /// embedded all-caps abbreviation, then initials
    pub fn subtopic_code(&self, subtopic: &str) -> String {
        let subtopic = subtopic.trim();
        let width = self.config.subtopic_width;

        if PLACEHOLDER_SUBTOPICS.contains(&subtopic.to_lowercase().as_str()) {
            return SENTINEL_SUBTOPIC_CODE.to_string();
        }

        if let Some(code) = self.config.known_subtopics.get(subtopic) {
            return truncate_upper(code, width);
        }

        let cleaned = keep_alphanumeric_words(subtopic);
        let words: Vec<&str> = cleaned.split_whitespace().collect();

        if words.is_empty() {
            return SENTINEL_SUBTOPIC_CODE.to_string();
        }
        if words.len() == 1 {
            return truncate_upper(words[0], width);
        }

        // "WACC Calculation" should yield WACC, not WC
        if let Some(acronym) = words
            .iter()
            .find(|w| w.chars().count() > 1 && w.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()))
        {
            return truncate_upper(acronym, width);
        }

        let initials: String = words
            .iter()
            .filter_map(|w| w.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if initials.chars().count() <= width {
            return initials;
        }

        if words[0].chars().count() <= 4 {
            let rest: String = words[1..]
                .iter()
                .filter_map(|w| w.chars().next())
                .map(|c| c.to_ascii_uppercase())
                .collect();
            return truncate_upper(&format!("{}{}", words[0].to_uppercase(), rest), width);
        }

        truncate_upper(words[0], width)
    }

    pub fn type_code(&self, question_type: &str) -> String {
        self.config
            .type_codes
            .get(question_type)
            .cloned()
            .unwrap_or_else(|| self.config.fallback_type_code.clone())
    }
}

/// Difficulty code is the first letter: Basic → B, Advanced → A
fn difficulty_code(difficulty: &str) -> char {
    difficulty
        .trim()
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('X')
}

/// Append the 3-digit sequence to a base id
pub fn format_id(base_id: &str, sequence: i64) -> String {
    format!("{}-{:03}", base_id, sequence)
}

/// Parse the trailing sequence from a full id, if present
pub fn trailing_sequence(question_id: &str) -> Option<i64> {
    question_id
        .rsplit_once('-')
        .and_then(|(_, tail)| tail.parse::<i64>().ok())
}

fn parenthetical_abbreviation(name: &str, width: usize) -> Option<String> {
    let start = name.find('(')?;
    let end = name[start..].find(')')? + start;
    let inner: String = name[start + 1..end]
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if !inner.is_empty() && inner.chars().count() <= width {
        Some(inner.to_uppercase())
    } else {
        None
    }
}

fn strip_parentheticals(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0u32;
    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Replace anything outside [A-Za-z0-9] with spaces so word splitting works
fn keep_alphanumeric_words(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect()
}

fn truncate_upper(s: &str, width: usize) -> String {
    s.chars().take(width).collect::<String>().to_uppercase()
}

/// Allocates sequence numbers for a base prefix by reading the current
/// maximum across both stores.
///
/// The read is advisory only: two concurrent callers can both see max=4 and
/// both propose 5. The UNIQUE constraint on `question_id` rejects the loser,
/// who bumps the sequence and retries.
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    pool: SqlitePool,
}

impl SequenceAllocator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Highest allocated sequence for the prefix across staged + committed
    /// stores, 0 when none exists
    pub async fn max_sequence(&self, base_id: &str) -> Result<i64> {
        let pattern = format!("{}-%", base_id);
        let rows = sqlx::query(
            "SELECT question_id FROM staged_questions WHERE question_id LIKE ?
             UNION ALL
             SELECT question_id FROM questions WHERE question_id LIKE ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        let mut max = 0i64;
        for row in &rows {
            let question_id: String = row.get("question_id");
            if let Some(sequence) = trailing_sequence(&question_id) {
                max = max.max(sequence);
            }
        }
        Ok(max)
    }

    /// Proposed next sequence for the prefix
    pub async fn next_sequence(&self, base_id: &str) -> Result<i64> {
        Ok(self.max_sequence(base_id).await? + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qstage_common::db::init::init_database;
    use std::path::PathBuf;

    fn generator() -> IdGenerator {
        IdGenerator::new(IdConfig::default())
    }

    #[test]
    fn parenthetical_abbreviation_wins() {
        assert_eq!(generator().topic_code("Discounted Cash Flow (DCF)"), "DCF");
        assert_eq!(generator().topic_code("Enterprise Value (EV)"), "EV");
    }

    #[test]
    fn known_topic_lookup_beats_derivation() {
        assert_eq!(generator().topic_code("Accounting"), "ACC");
    }

    #[test]
    fn multi_word_topic_falls_back_to_first_word() {
        // Initials "MA" are too short, so the first word is truncated
        assert_eq!(generator().topic_code("Mergers and Acquisitions"), "MERG");
    }

    #[test]
    fn long_initials_are_kept() {
        assert_eq!(generator().topic_code("Leveraged Buyout Capital Structure"), "LBCS");
    }

    #[test]
    fn subtopic_prefers_embedded_acronym() {
        assert_eq!(generator().subtopic_code("WACC Calculation"), "WACC");
    }

    #[test]
    fn subtopic_initials_when_no_acronym() {
        assert_eq!(generator().subtopic_code("Terminal Value"), "TV");
    }

    #[test]
    fn single_word_subtopic_is_truncated() {
        assert_eq!(generator().subtopic_code("Depreciation"), "DEPRECIA");
    }

    #[test]
    fn placeholder_subtopics_map_to_sentinel() {
        for placeholder in ["Undefined", "unknown", "General", "misc"] {
            assert_eq!(generator().subtopic_code(placeholder), SENTINEL_SUBTOPIC_CODE);
        }
    }

    #[test]
    fn base_id_matches_documented_pattern() {
        let base = generator().base_id("Discounted Cash Flow (DCF)", "WACC Calculation", "Basic", "Question");
        assert_eq!(base, "DCF-WACC-B-Q");
        assert_eq!(format_id(&base, 1), "DCF-WACC-B-Q-001");
    }

    #[test]
    fn type_codes_come_from_config() {
        let gen = generator();
        assert_eq!(gen.type_code("Question"), "Q");
        assert_eq!(gen.type_code("Definition"), "Q");
        assert_eq!(gen.type_code("Calculation"), "P");
        // Unknown types get the fallback
        assert_eq!(gen.type_code("Riddle"), "Q");

        let legacy = IdGenerator::new(IdConfig::legacy());
        assert_eq!(legacy.type_code("Definition"), "D");
        assert_eq!(legacy.type_code("Calculation"), "C");
    }

    #[test]
    fn trailing_sequence_parses_only_numeric_tails() {
        assert_eq!(trailing_sequence("DCF-WACC-B-Q-007"), Some(7));
        assert_eq!(trailing_sequence("DCF-WACC-B-Q-123"), Some(123));
        assert_eq!(trailing_sequence("DCF-WACC-B-Q"), None);
    }

    async fn test_pool(name: &str) -> sqlx::SqlitePool {
        let path = PathBuf::from(format!("/tmp/qstage-idtest-{}-{}.db", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        init_database(&path).await.unwrap()
    }

    async fn insert_committed(pool: &sqlx::SqlitePool, id: &str) {
        sqlx::query(
            "INSERT INTO questions (question_id, topic, subtopic, difficulty, question_type, question, answer)
             VALUES (?, 'DCF', 'WACC', 'Basic', 'Question', 'Q?', 'A.')",
        )
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn allocator_reads_max_across_both_stores() {
        let pool = test_pool("both-stores").await;
        insert_committed(&pool, "DCF-WACC-B-Q-001").await;
        insert_committed(&pool, "DCF-WACC-B-Q-002").await;

        sqlx::query(
            "INSERT INTO upload_batches (batch_id, file_name, uploaded_by, uploaded_at, total_questions, status)
             VALUES ('b1', 'f.md', 'u', '2026-01-01T00:00:00Z', 1, 'pending')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO staged_questions
             (question_id, upload_batch_id, topic, subtopic, difficulty, question_type,
              question, answer, status, created_at, uploaded_by, uploaded_on)
             VALUES ('DCF-WACC-B-Q-005', 'b1', 'DCF', 'WACC', 'Basic', 'Question',
                     'Q?', 'A.', 'pending', '2026-01-01T00:00:00Z', 'u', '01/01/26 9:00AM ET')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let allocator = SequenceAllocator::new(pool);
        assert_eq!(allocator.max_sequence("DCF-WACC-B-Q").await.unwrap(), 5);
        assert_eq!(allocator.next_sequence("DCF-WACC-B-Q").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn allocator_starts_fresh_prefixes_at_one() {
        let pool = test_pool("fresh-prefix").await;
        insert_committed(&pool, "DCF-WACC-B-Q-001").await;

        let allocator = SequenceAllocator::new(pool);
        assert_eq!(allocator.next_sequence("ACC-REV-B-Q").await.unwrap(), 1);
    }
}
