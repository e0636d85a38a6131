//! Staging workflow state machine
//!
//! Batches and staged questions carry tagged status enums with an explicit
//! transition table. Illegal transitions are rejected at this boundary
//! instead of trusting caller-supplied strings, and question statuses are
//! monotonic - nothing ever reverts from Imported.

use chrono::{DateTime, Utc};
use qstage_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Status of an upload batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Created, no review action yet
    Pending,
    /// At least one review action taken, or an import pass started
    Reviewing,
    /// Import pass finished with zero failures
    Completed,
    /// Soft-cancelled, or an import pass had failures
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Reviewing => "reviewing",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    /// Transition table: Pending → Reviewing → Completed | Cancelled
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        use BatchStatus::*;
        matches!(
            (self, next),
            (Pending, Reviewing) | (Pending, Cancelled) | (Reviewing, Completed) | (Reviewing, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Cancelled)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "reviewing" => Ok(BatchStatus::Reviewing),
            "completed" => Ok(BatchStatus::Completed),
            "cancelled" => Ok(BatchStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("Unknown batch status: {}", other))),
        }
    }
}

/// Status of a staged question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Pending,
    Approved,
    Rejected,
    /// Matched an existing committed question; awaiting resolution
    Duplicate,
    /// Copied into the committed store (terminal)
    Imported,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Pending => "pending",
            QuestionStatus::Approved => "approved",
            QuestionStatus::Rejected => "rejected",
            QuestionStatus::Duplicate => "duplicate",
            QuestionStatus::Imported => "imported",
        }
    }

    /// Transition table:
    /// Pending → {Approved, Rejected, Duplicate};
    /// Duplicate → {Approved, Rejected} (via resolution);
    /// Approved → Imported (terminal, only from Approved).
    pub fn can_transition_to(self, next: QuestionStatus) -> bool {
        use QuestionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Duplicate)
                | (Duplicate, Approved)
                | (Duplicate, Rejected)
                | (Approved, Imported)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, QuestionStatus::Imported)
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(QuestionStatus::Pending),
            "approved" => Ok(QuestionStatus::Approved),
            "rejected" => Ok(QuestionStatus::Rejected),
            "duplicate" => Ok(QuestionStatus::Duplicate),
            "imported" => Ok(QuestionStatus::Imported),
            other => Err(Error::InvalidInput(format!("Unknown question status: {}", other))),
        }
    }
}

/// Reviewer decision on a detected duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateResolution {
    /// Reject the staged question, keep the committed one
    KeepExisting,
    /// Approve the staged question; it overwrites the target on import
    Replace,
    /// Approve the staged question and clear the duplicate link
    KeepBoth,
    /// Not yet resolved
    Pending,
}

impl DuplicateResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateResolution::KeepExisting => "keep_existing",
            DuplicateResolution::Replace => "replace",
            DuplicateResolution::KeepBoth => "keep_both",
            DuplicateResolution::Pending => "pending",
        }
    }
}

impl fmt::Display for DuplicateResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicateResolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "keep_existing" => Ok(DuplicateResolution::KeepExisting),
            "replace" => Ok(DuplicateResolution::Replace),
            "keep_both" => Ok(DuplicateResolution::KeepBoth),
            "pending" => Ok(DuplicateResolution::Pending),
            other => Err(Error::InvalidInput(format!("Unknown resolution: {}", other))),
        }
    }
}

/// Bulk review action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn target_status(self) -> QuestionStatus {
        match self {
            ReviewAction::Approve => QuestionStatus::Approved,
            ReviewAction::Reject => QuestionStatus::Rejected,
        }
    }
}

impl FromStr for ReviewAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "approve" => Ok(ReviewAction::Approve),
            "reject" => Ok(ReviewAction::Reject),
            other => Err(Error::InvalidInput(format!(
                "Unknown review action '{}', must be 'approve' or 'reject'",
                other
            ))),
        }
    }
}

/// One upload's worth of staged questions, reviewed together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: Uuid,
    pub file_name: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub total_questions: i64,
    pub questions_pending: i64,
    pub questions_approved: i64,
    pub questions_rejected: i64,
    pub questions_duplicate: i64,
    pub status: BatchStatus,
    pub notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub review_started_at: Option<DateTime<Utc>>,
    pub review_completed_at: Option<DateTime<Utc>>,
    pub import_started_at: Option<DateTime<Utc>>,
    pub import_completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Create a new batch in the Pending state with all questions pending
    pub fn new(file_name: String, total_questions: i64, uploaded_by: String, notes: Option<String>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            file_name,
            uploaded_by,
            uploaded_at: Utc::now(),
            total_questions,
            questions_pending: total_questions,
            questions_approved: 0,
            questions_rejected: 0,
            questions_duplicate: 0,
            status: BatchStatus::Pending,
            notes,
            reviewed_by: None,
            review_started_at: None,
            review_completed_at: None,
            import_started_at: None,
            import_completed_at: None,
        }
    }

    /// Counter invariant: pending + approved + rejected + duplicate == total.
    /// Imported rows continue to count against the bucket they left
    /// (approved), so the sum holds for the life of the batch.
    pub fn counters_consistent(&self) -> bool {
        self.questions_pending + self.questions_approved + self.questions_rejected + self.questions_duplicate
            == self.total_questions
    }
}

/// A question awaiting review before entering the committed corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedQuestion {
    /// Semantic identifier, unique across staged and committed stores
    pub question_id: String,
    pub upload_batch_id: Uuid,
    pub topic: String,
    pub subtopic: String,
    pub difficulty: String,
    pub question_type: String,
    pub question: String,
    pub answer: String,
    pub notes_for_tutor: Option<String>,
    pub status: QuestionStatus,
    /// Committed question this one duplicates, if detection matched
    pub duplicate_of: Option<String>,
    pub similarity_score: Option<f64>,
    pub review_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub uploaded_by: String,
    /// Free-form display timestamp, stored and returned verbatim
    pub uploaded_on: String,
    pub upload_notes: Option<String>,
}

/// A detected staged-vs-committed duplicate pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub duplicate_id: Uuid,
    pub staged_question_id: String,
    pub existing_question_id: String,
    /// Similarity score, bounded [0, 1]
    pub similarity_score: f64,
    pub resolution: DuplicateResolution,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
