//! Content validation for parsed Q&A documents
//!
//! Pure functions, deterministic on identical input, no store access.
//! Phase A checks document structure, Phase B checks field semantics per
//! block. Both phases collect every problem instead of failing fast;
//! validity means zero errors, and warnings never block.

use crate::parser::{self, ParseOutcome, QuestionBlock};
use serde::{Deserialize, Serialize};

/// Allowed difficulty values
pub const VALID_DIFFICULTIES: [&str; 2] = ["Basic", "Advanced"];

/// Allowed question type values
pub const VALID_TYPES: [&str; 6] = [
    "Definition",
    "Problem",
    "GenConcept",
    "Calculation",
    "Analysis",
    "Question",
];

pub const MAX_SUBTOPIC_LENGTH: usize = 100;
pub const MAX_QUESTION_LENGTH: usize = 5000;
pub const MAX_ANSWER_LENGTH: usize = 10000;

/// Content beyond these lengths is legal but flagged
const LONG_QUESTION_WARNING: usize = 1000;
const LONG_ANSWER_WARNING: usize = 2000;

/// Result of validating one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// Block-indexed, in document order; empty means valid
    pub errors: Vec<String>,
    /// Non-blocking advisories
    pub warnings: Vec<String>,
    /// Number of blocks that parsed successfully
    pub parsed_count: usize,
}

impl ValidationOutcome {
    fn from_lists(errors: Vec<String>, warnings: Vec<String>, parsed_count: usize) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            parsed_count,
        }
    }

    /// Merge a later phase into this one; validity is the conjunction
    pub fn merge(&mut self, other: ValidationOutcome) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.is_valid = self.errors.is_empty();
    }
}

/// Parse and fully validate a document in one call.
///
/// Returns the parsed blocks alongside the combined structural + semantic
/// outcome. Blocks are returned even when invalid so callers can show them
/// next to their errors.
pub fn parse_and_validate(content: &str) -> (Vec<QuestionBlock>, ValidationOutcome) {
    let parse = parser::parse_document(content);
    let mut outcome = validate_structure(content, &parse);
    outcome.merge(validate_content(&parse.blocks));
    (parse.blocks, outcome)
}

/// Phase A: document structure.
///
/// Requires a topic header, at least one subtopic section, and at least one
/// parsable block; every skipped block becomes one error referencing it.
pub fn validate_structure(content: &str, parse: &ParseOutcome) -> ValidationOutcome {
    let mut errors = Vec::new();

    if !content.lines().any(|l| l.starts_with("# Topic:")) {
        errors.push("Missing topic header. Expected format: '# Topic: Your Topic Name'".to_string());
    }

    if !content.lines().any(|l| l.starts_with("## ")) {
        errors.push(
            "No subtopic sections found. Expected format: '## Subtopic: Your Subtopic Name'"
                .to_string(),
        );
    }

    if parse.blocks.is_empty() && parse.skipped.is_empty() {
        errors.push(
            "No question blocks found. Check formatting of **Question:** and **Answer:** \
             sections. **Notes for Tutor:** is optional."
                .to_string(),
        );
    }

    for skipped in &parse.skipped {
        errors.push(format!(
            "Question block at line {}: {}",
            skipped.line,
            skipped.reason.describe()
        ));
    }

    ValidationOutcome::from_lists(errors, Vec::new(), parse.blocks.len())
}

/// Phase B: per-block field semantics
pub fn validate_content(blocks: &[QuestionBlock]) -> ValidationOutcome {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (i, block) in blocks.iter().enumerate() {
        let n = i + 1;

        if !VALID_DIFFICULTIES.contains(&block.difficulty.as_str()) {
            errors.push(format!(
                "Question {}: Invalid difficulty '{}'. Must be: {}",
                n,
                block.difficulty,
                VALID_DIFFICULTIES.join(", ")
            ));
        }

        if !VALID_TYPES.contains(&block.question_type.as_str()) {
            errors.push(format!(
                "Question {}: Invalid type '{}'. Must be: {}",
                n,
                block.question_type,
                VALID_TYPES.join(", ")
            ));
        }

        if block.subtopic.chars().count() > MAX_SUBTOPIC_LENGTH {
            errors.push(format!(
                "Question {}: Subtopic exceeds {} characters",
                n, MAX_SUBTOPIC_LENGTH
            ));
        }

        if block.question.chars().count() > MAX_QUESTION_LENGTH {
            errors.push(format!(
                "Question {}: Question text exceeds {} characters",
                n, MAX_QUESTION_LENGTH
            ));
        }

        if block.answer.chars().count() > MAX_ANSWER_LENGTH {
            errors.push(format!(
                "Question {}: Answer text exceeds {} characters",
                n, MAX_ANSWER_LENGTH
            ));
        }

        if block.question.trim().is_empty() {
            errors.push(format!("Question {}: Question text cannot be empty", n));
        }

        if block.answer.trim().is_empty() {
            errors.push(format!("Question {}: Answer text cannot be empty", n));
        }

        if block.question.chars().count() > LONG_QUESTION_WARNING
            && block.question.chars().count() <= MAX_QUESTION_LENGTH
        {
            warnings.push(format!(
                "Question {}: Question text is very long ({} characters)",
                n,
                block.question.chars().count()
            ));
        }

        if block.answer.chars().count() > LONG_ANSWER_WARNING
            && block.answer.chars().count() <= MAX_ANSWER_LENGTH
        {
            warnings.push(format!(
                "Question {}: Answer text is very long ({} characters)",
                n,
                block.answer.chars().count()
            ));
        }
    }

    ValidationOutcome::from_lists(errors, warnings, blocks.len())
}
