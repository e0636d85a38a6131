//! Staging workflow service
//!
//! Orchestrates the full pipeline: batch creation, staging with identifier
//! allocation, duplicate detection, bulk review, duplicate resolution, and
//! import into the committed store.
//!
//! Staging is all-or-nothing: one transaction covers every row, and an
//! unresolvable id conflict rolls the whole call back. Import is the
//! opposite by design: per-row failures are collected and returned, and the
//! remaining rows still land.

use crate::config::PipelineConfig;
use crate::db;
use crate::db::staged::StatusCounts;
use crate::dedup::{DuplicateCluster, DuplicateDetector, QuestionText};
use crate::identifier::{format_id, IdGenerator, SequenceAllocator};
use crate::models::{
    Batch, BatchStatus, DuplicateRecord, DuplicateResolution, NewStagedQuestion, QuestionStatus,
    ReviewAction, StagedQuestion,
};
use chrono::Utc;
use qstage_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of staging one batch of questions
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub batch_id: Uuid,
    pub staged_count: usize,
    pub question_ids: Vec<String>,
}

/// Result of one duplicate detection pass
#[derive(Debug, Clone, Serialize)]
pub struct DetectionSummary {
    pub batch_id: Uuid,
    pub questions_checked: usize,
    pub duplicates_found: usize,
}

/// Result of a bulk review call, with per-item failure reasons
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub batch_id: Uuid,
    pub updated_ids: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Result of an import pass, with per-row failure reasons
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub batch_id: Uuid,
    pub imported_ids: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// The staging pipeline's service facade
#[derive(Debug, Clone)]
pub struct StagingService {
    pool: SqlitePool,
    config: PipelineConfig,
    id_generator: IdGenerator,
    allocator: SequenceAllocator,
}

impl StagingService {
    pub fn new(pool: SqlitePool, config: PipelineConfig) -> Self {
        let id_generator = IdGenerator::new(config.id.clone());
        let allocator = SequenceAllocator::new(pool.clone());
        Self {
            pool,
            config,
            id_generator,
            allocator,
        }
    }

    /// Create a new batch in the Pending state
    pub async fn create_batch(
        &self,
        file_name: &str,
        total_questions: i64,
        uploaded_by: &str,
        notes: Option<String>,
    ) -> Result<Batch> {
        let batch = Batch::new(file_name.to_string(), total_questions, uploaded_by.to_string(), notes);
        db::batches::save_batch(&self.pool, &batch).await?;
        info!(batch_id = %batch.batch_id, file_name, total_questions, "Created upload batch");
        Ok(batch)
    }

    pub async fn get_batch(&self, batch_id: Uuid) -> Result<Batch> {
        db::batches::load_batch(&self.pool, batch_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Batch {} not found", batch_id)))
    }

    /// Stage questions into a batch, generating identifiers.
    ///
    /// All-or-nothing: every row lands or none does. Sequences come from a
    /// store read per prefix, with an in-call tracker covering rows that
    /// share a prefix and are not yet visible to a fresh read. A write-time
    /// UNIQUE violation bumps the sequence and retries up to the configured
    /// attempt limit.
    pub async fn stage_questions(
        &self,
        batch_id: Uuid,
        questions: Vec<NewStagedQuestion>,
    ) -> Result<StageSummary> {
        let batch = self.get_batch(batch_id).await?;
        if batch.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "Batch {} is {} and cannot accept questions",
                batch_id, batch.status
            )));
        }

        info!(batch_id = %batch_id, count = questions.len(), "Staging questions");

        // base id -> last sequence handed out in this call
        let mut tracker: HashMap<String, i64> = HashMap::new();
        let mut rows: Vec<(String, StagedQuestion)> = Vec::with_capacity(questions.len());
        let now = Utc::now();

        for q in questions {
            let base_id = self
                .id_generator
                .base_id(&q.topic, &q.subtopic, &q.difficulty, &q.question_type);

            let sequence = match tracker.get(&base_id) {
                Some(last) => last + 1,
                None => self.allocator.next_sequence(&base_id).await?,
            };
            tracker.insert(base_id.clone(), sequence);

            let question_id = format_id(&base_id, sequence);
            debug!(question_id = %question_id, "Generated staged question id");

            rows.push((
                base_id,
                StagedQuestion {
                    question_id,
                    upload_batch_id: batch_id,
                    topic: q.topic,
                    subtopic: q.subtopic,
                    difficulty: q.difficulty,
                    question_type: q.question_type,
                    question: q.question,
                    answer: q.answer,
                    notes_for_tutor: q.notes_for_tutor,
                    status: QuestionStatus::Pending,
                    duplicate_of: None,
                    similarity_score: None,
                    review_notes: None,
                    reviewed_by: None,
                    reviewed_at: None,
                    created_at: now,
                    uploaded_by: q.uploaded_by,
                    uploaded_on: q.uploaded_on,
                    upload_notes: q.upload_notes,
                },
            ));
        }

        // The tracker should make intra-batch collisions impossible; if one
        // appears anyway, abort with the offending ids rather than letting
        // the store reject an arbitrary row
        let colliding = intra_batch_collisions(&rows);
        if !colliding.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Duplicate question ids within batch: {}",
                colliding.join(", ")
            )));
        }

        let mut tx = self.pool.begin().await?;
        for (base_id, question) in &mut rows {
            // An early error drops the transaction and rolls back every row
            insert_with_retry(&mut tx, base_id, question, &mut tracker, self.config.max_sequence_attempts)
                .await?;
        }
        tx.commit().await?;

        let question_ids: Vec<String> = rows.iter().map(|(_, q)| q.question_id.clone()).collect();
        info!(batch_id = %batch_id, staged = question_ids.len(), "Staged questions committed");

        Ok(StageSummary {
            batch_id,
            staged_count: question_ids.len(),
            question_ids,
        })
    }

    /// Run duplicate detection over the batch's Pending questions.
    ///
    /// Each staged question is compared against the committed corpus; the
    /// first match at or above threshold marks it Duplicate and records a
    /// DuplicateRecord. Staged siblings are not compared against each other
    /// in this pass.
    pub async fn detect_duplicates(&self, batch_id: Uuid, threshold: Option<f64>) -> Result<DetectionSummary> {
        let batch = self.get_batch(batch_id).await?;
        if batch.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "Batch {} is {} and cannot run duplicate detection",
                batch_id, batch.status
            )));
        }

        let threshold = threshold.unwrap_or(self.config.staging_threshold);
        let pending =
            db::staged::load_batch_questions(&self.pool, batch_id, Some(QuestionStatus::Pending)).await?;

        if pending.is_empty() {
            return Ok(DetectionSummary {
                batch_id,
                questions_checked: 0,
                duplicates_found: 0,
            });
        }

        let subjects: Vec<QuestionText> = pending
            .iter()
            .map(|q| QuestionText {
                question_id: q.question_id.clone(),
                question: q.question.clone(),
            })
            .collect();

        let detector = DuplicateDetector::new(self.pool.clone(), threshold, self.config.max_scan_corpus);
        let pairs = detector.detect_targeted(&subjects).await?;

        let mut marked: HashSet<String> = HashSet::new();
        let mut duplicates_found = 0usize;
        for pair in &pairs {
            // First match wins; later matches for the same subject are noise
            if !marked.insert(pair.first_id.clone()) {
                continue;
            }

            db::staged::mark_duplicate(&self.pool, &pair.first_id, &pair.second_id, pair.score).await?;
            let record = DuplicateRecord {
                duplicate_id: Uuid::new_v4(),
                staged_question_id: pair.first_id.clone(),
                existing_question_id: pair.second_id.clone(),
                similarity_score: pair.score,
                resolution: DuplicateResolution::Pending,
                resolution_notes: None,
                resolved_by: None,
                resolved_at: None,
                created_at: Utc::now(),
            };
            db::duplicates::save_duplicate(&self.pool, &record).await?;
            duplicates_found += 1;
        }

        self.refresh_batch_counters(batch_id).await?;
        info!(
            batch_id = %batch_id,
            checked = pending.len(),
            duplicates = duplicates_found,
            "Duplicate detection complete"
        );

        Ok(DetectionSummary {
            batch_id,
            questions_checked: pending.len(),
            duplicates_found,
        })
    }

    /// Bulk approve or reject staged questions.
    ///
    /// Per-item failures (missing rows, illegal transitions) are collected
    /// and returned; the remaining items still update. The batch moves to
    /// Reviewing on its first review action.
    pub async fn review_batch(
        &self,
        batch_id: Uuid,
        question_ids: &[String],
        action: &str,
        reviewed_by: &str,
        review_notes: Option<&str>,
    ) -> Result<ReviewSummary> {
        let action: ReviewAction = action.parse()?;
        let target = action.target_status();
        let batch = self.get_batch(batch_id).await?;
        if batch.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "Batch {} is {} and cannot be reviewed",
                batch_id, batch.status
            )));
        }

        let mut updated_ids = Vec::new();
        let mut failed = Vec::new();

        for question_id in question_ids {
            let staged = match db::staged::load_staged_question(&self.pool, question_id).await? {
                Some(q) if q.upload_batch_id == batch_id => q,
                Some(_) => {
                    failed.push((question_id.clone(), "Question belongs to a different batch".to_string()));
                    continue;
                }
                None => {
                    failed.push((question_id.clone(), "Question not found".to_string()));
                    continue;
                }
            };

            if !staged.status.can_transition_to(target) {
                failed.push((
                    question_id.clone(),
                    format!("Cannot move from {} to {}", staged.status, target),
                ));
                continue;
            }

            db::staged::update_question_status(&self.pool, question_id, target, reviewed_by, review_notes)
                .await?;
            updated_ids.push(question_id.clone());
        }

        // First review action starts the review
        if batch.review_started_at.is_none() && batch.status.can_transition_to(BatchStatus::Reviewing) {
            let mut batch = batch;
            batch.status = BatchStatus::Reviewing;
            batch.review_started_at = Some(Utc::now());
            batch.reviewed_by = Some(reviewed_by.to_string());
            db::batches::update_batch(&self.pool, &batch).await?;
        }

        self.refresh_batch_counters(batch_id).await?;
        info!(
            batch_id = %batch_id,
            updated = updated_ids.len(),
            failed = failed.len(),
            "Review action applied"
        );

        Ok(ReviewSummary {
            batch_id,
            updated_ids,
            failed,
        })
    }

    /// Apply a reviewer's resolution to a detected duplicate.
    ///
    /// KeepExisting rejects the staged question; Replace approves it and
    /// leaves the duplicate link in place so import overwrites the target;
    /// KeepBoth approves it and clears the link.
    pub async fn resolve_duplicate(
        &self,
        duplicate_id: Uuid,
        resolution: DuplicateResolution,
        resolved_by: &str,
        resolution_notes: Option<&str>,
    ) -> Result<()> {
        if resolution == DuplicateResolution::Pending {
            return Err(Error::InvalidInput(
                "Resolution must be keep_existing, replace, or keep_both".to_string(),
            ));
        }

        let record = db::duplicates::load_duplicate(&self.pool, duplicate_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Duplicate record {} not found", duplicate_id)))?;

        let staged = db::staged::load_staged_question(&self.pool, &record.staged_question_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("Staged question {} not found", record.staged_question_id))
            })?;

        let target = match resolution {
            DuplicateResolution::KeepExisting => QuestionStatus::Rejected,
            DuplicateResolution::Replace | DuplicateResolution::KeepBoth => QuestionStatus::Approved,
            DuplicateResolution::Pending => unreachable!(),
        };
        if !staged.status.can_transition_to(target) {
            return Err(Error::InvalidTransition(format!(
                "Cannot resolve {}: status is {}, not duplicate",
                record.staged_question_id, staged.status
            )));
        }

        db::duplicates::update_resolution(&self.pool, duplicate_id, resolution, resolution_notes, resolved_by)
            .await?;

        let note = match resolution {
            DuplicateResolution::KeepExisting => {
                format!("Duplicate of {} - keeping existing", record.existing_question_id)
            }
            DuplicateResolution::Replace => format!("Will replace {}", record.existing_question_id),
            DuplicateResolution::KeepBoth => "Keeping both questions despite similarity".to_string(),
            DuplicateResolution::Pending => unreachable!(),
        };
        db::staged::update_question_status(
            &self.pool,
            &record.staged_question_id,
            target,
            resolved_by,
            Some(&note),
        )
        .await?;

        if resolution == DuplicateResolution::KeepBoth {
            db::staged::clear_duplicate_link(&self.pool, &record.staged_question_id).await?;
        }

        self.refresh_batch_counters(staged.upload_batch_id).await?;
        info!(
            duplicate_id = %duplicate_id,
            staged_id = %record.staged_question_id,
            resolution = %resolution,
            "Duplicate resolved"
        );

        Ok(())
    }

    /// Import the batch's Approved questions into the committed store.
    ///
    /// Per-row failures are recorded and do not stop the pass. The batch
    /// finishes Completed only when every row imported; any failure leaves
    /// it Cancelled.
    pub async fn import_approved(&self, batch_id: Uuid, imported_by: &str) -> Result<ImportSummary> {
        let mut batch = self.get_batch(batch_id).await?;
        if batch.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "Batch {} is already {}",
                batch_id, batch.status
            )));
        }

        if batch.status == BatchStatus::Pending {
            batch.status = BatchStatus::Reviewing;
        }
        batch.import_started_at = Some(Utc::now());
        db::batches::update_batch(&self.pool, &batch).await?;

        let approved =
            db::staged::load_batch_questions(&self.pool, batch_id, Some(QuestionStatus::Approved)).await?;
        if approved.is_empty() {
            return Err(Error::Conflict("No approved questions to import".to_string()));
        }

        let mut imported_ids = Vec::new();
        let mut failed: Vec<(String, String)> = Vec::new();

        for staged in &approved {
            let result = self.import_one(staged).await;
            match result {
                Ok(()) => {
                    db::staged::set_status(&self.pool, &staged.question_id, QuestionStatus::Imported).await?;
                    imported_ids.push(staged.question_id.clone());
                }
                Err(e) => {
                    warn!(question_id = %staged.question_id, error = %e, "Import failed for question");
                    failed.push((staged.question_id.clone(), e.to_string()));
                }
            }
        }

        let final_status = if failed.is_empty() {
            BatchStatus::Completed
        } else {
            BatchStatus::Cancelled
        };

        let mut batch = self.refresh_batch_counters(batch_id).await?;
        batch.status = final_status;
        batch.import_completed_at = Some(Utc::now());
        batch.reviewed_by = Some(imported_by.to_string());
        db::batches::update_batch(&self.pool, &batch).await?;

        info!(
            batch_id = %batch_id,
            imported = imported_ids.len(),
            failed = failed.len(),
            status = %final_status,
            "Import pass finished"
        );

        Ok(ImportSummary {
            batch_id,
            imported_ids,
            failed,
        })
    }

    /// Copy one approved row into the committed store. A surviving
    /// duplicate link means a Replace resolution: the target is removed in
    /// the same transaction as the insert.
    async fn import_one(&self, staged: &StagedQuestion) -> Result<()> {
        match &staged.duplicate_of {
            Some(target_id) => {
                let mut tx = self.pool.begin().await?;
                db::questions::delete_question(&mut *tx, target_id).await?;
                db::questions::insert_from_staged(&mut *tx, staged).await?;
                tx.commit().await?;
                info!(
                    question_id = %staged.question_id,
                    replaced = %target_id,
                    "Imported question, replacing existing"
                );
                Ok(())
            }
            None => db::questions::insert_from_staged(&self.pool, staged).await,
        }
    }

    /// Pairwise duplicate scan of the whole committed corpus, at the
    /// configured scan threshold and corpus-size ceiling
    pub async fn scan_corpus(&self) -> Result<Vec<DuplicateCluster>> {
        let detector = DuplicateDetector::new(
            self.pool.clone(),
            self.config.scan_threshold,
            self.config.max_scan_corpus,
        );
        detector.scan_all().await
    }

    /// A batch's staged questions, optionally filtered by status
    pub async fn get_batch_questions(
        &self,
        batch_id: Uuid,
        status: Option<QuestionStatus>,
    ) -> Result<Vec<StagedQuestion>> {
        self.get_batch(batch_id).await?;
        db::staged::load_batch_questions(&self.pool, batch_id, status).await
    }

    /// Recompute batch counters from the staged rows and persist them
    pub async fn refresh_batch_counters(&self, batch_id: Uuid) -> Result<Batch> {
        let mut batch = self.get_batch(batch_id).await?;
        let StatusCounts {
            pending,
            approved,
            rejected,
            duplicate,
        } = db::staged::status_counts(&self.pool, batch_id).await?;

        batch.questions_pending = pending;
        batch.questions_approved = approved;
        batch.questions_rejected = rejected;
        batch.questions_duplicate = duplicate;
        db::batches::update_batch(&self.pool, &batch).await?;
        Ok(batch)
    }
}

/// Ids appearing more than once among the prepared rows, in row order
fn intra_batch_collisions(rows: &[(String, StagedQuestion)]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|(_, q)| !seen.insert(q.question_id.as_str()))
        .map(|(_, q)| q.question_id.clone())
        .collect()
}

/// Insert one staged row, bumping the sequence on a UNIQUE violation.
///
/// The tracker holds the last sequence handed out per base id in this call,
/// so a retried row skips past ids already claimed by its siblings. After
/// `max_attempts` violations the allocation is abandoned as exhausted.
async fn insert_with_retry(
    conn: &mut sqlx::SqliteConnection,
    base_id: &str,
    question: &mut StagedQuestion,
    tracker: &mut HashMap<String, i64>,
    max_attempts: u32,
) -> Result<()> {
    let mut attempts: u32 = 0;
    loop {
        match db::staged::insert_staged_question(&mut *conn, question).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_unique_violation() => {
                attempts += 1;
                if attempts >= max_attempts {
                    return Err(Error::SequenceExhausted {
                        prefix: base_id.to_string(),
                        attempts,
                    });
                }
                let next = tracker.get(base_id).map(|last| last + 1).unwrap_or(1);
                tracker.insert(base_id.to_string(), next);
                warn!(
                    question_id = %question.question_id,
                    attempt = attempts,
                    "Id conflict on insert, retrying with next sequence"
                );
                question.question_id = format_id(base_id, next);
            }
            Err(e) => return Err(e),
        }
    }
}
