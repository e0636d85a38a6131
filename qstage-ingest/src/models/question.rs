//! Question content models

use crate::parser::QuestionBlock;
use serde::{Deserialize, Serialize};

/// Upload metadata delivered by the transport alongside the document.
///
/// `uploaded_on` may be a machine timestamp or a free-form short display
/// string; the pipeline stores and returns it verbatim and performs no date
/// arithmetic on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub uploaded_by: String,
    pub uploaded_on: String,
    pub upload_notes: Option<String>,
}

/// Input to the staging call: parsed content plus who uploaded it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStagedQuestion {
    pub topic: String,
    pub subtopic: String,
    pub difficulty: String,
    pub question_type: String,
    pub question: String,
    pub answer: String,
    pub notes_for_tutor: Option<String>,
    pub uploaded_by: String,
    pub uploaded_on: String,
    pub upload_notes: Option<String>,
}

impl NewStagedQuestion {
    /// Pair a parsed block with its upload metadata
    pub fn from_block(block: QuestionBlock, meta: &UploadMetadata) -> Self {
        Self {
            topic: block.topic,
            subtopic: block.subtopic,
            difficulty: block.difficulty,
            question_type: block.question_type,
            question: block.question,
            answer: block.answer,
            notes_for_tutor: block.notes_for_tutor,
            uploaded_by: meta.uploaded_by.clone(),
            uploaded_on: meta.uploaded_on.clone(),
            upload_notes: meta.upload_notes.clone(),
        }
    }
}

/// A question in the authoritative corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommittedQuestion {
    pub question_id: String,
    pub topic: String,
    pub subtopic: String,
    pub difficulty: String,
    pub question_type: String,
    pub question: String,
    pub answer: String,
    pub notes_for_tutor: Option<String>,
    pub uploaded_by: Option<String>,
    pub uploaded_on: Option<String>,
    pub upload_notes: Option<String>,
    pub updated_at: Option<String>,
}
