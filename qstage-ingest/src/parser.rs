//! Structural parser for semi-structured Q&A documents
//!
//! Scans line by line, carrying topic/subtopic/difficulty/type context from
//! headings. A block opens at a `**Question:**` marker (only when difficulty
//! and type context are already set) and closes at the next context-changing
//! heading or end of document. A block is kept only when it contains both a
//! Question and an Answer marker; anything dropped produces an explicit
//! `SkippedBlock` diagnostic rather than vanishing silently.
//!
//! The parser is deliberately lenient about heading values (any difficulty
//! string sets context); vocabulary enforcement belongs to the validator.

const TOPIC_MARKER: &str = "# Topic:";
const SUBTOPIC_MARKER: &str = "## ";
const DIFFICULTY_MARKER: &str = "### Difficulty:";
const TYPE_MARKER: &str = "#### Type:";
const QUESTION_MARKER: &str = "**Question:**";
const ANSWER_MARKER: &str = "**Answer:**";
const NOTES_MARKER: &str = "**Notes for Tutor:**";

/// One parsed question with its hierarchical context
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBlock {
    pub topic: String,
    pub subtopic: String,
    pub difficulty: String,
    pub question_type: String,
    pub question: String,
    pub answer: String,
    pub notes_for_tutor: Option<String>,
    /// Best-effort line of the `**Question:**` marker (1-based)
    pub source_line: Option<usize>,
}

/// Why a region of the document produced no block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Question marker seen before difficulty/type context was set
    MissingContext,
    /// Block flushed (by a heading change or end of document) without an
    /// Answer marker
    MissingAnswer,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::MissingContext => {
                "**Question:** marker before difficulty/type context was set"
            }
            SkipReason::MissingAnswer => "missing **Answer:** section",
        }
    }
}

/// Diagnostic for content the parser could not turn into a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    /// Line of the `**Question:**` marker that opened the region (1-based)
    pub line: usize,
    pub reason: SkipReason,
}

/// Result of one parsing pass: ordered blocks plus skip diagnostics
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub blocks: Vec<QuestionBlock>,
    pub skipped: Vec<SkippedBlock>,
}

#[derive(Debug)]
enum Section {
    Question,
    Answer,
    Notes,
}

#[derive(Debug)]
struct OpenBlock {
    start_line: usize,
    question: String,
    answer_lines: Vec<String>,
    notes_lines: Vec<String>,
    section: Section,
    has_answer: bool,
}

impl OpenBlock {
    fn new(start_line: usize, question: String) -> Self {
        Self {
            start_line,
            question,
            answer_lines: Vec::new(),
            notes_lines: Vec::new(),
            section: Section::Question,
            has_answer: false,
        }
    }
}

/// Scanner state: current heading context plus the block under construction
#[derive(Debug, Default)]
struct DocumentParser {
    topic: Option<String>,
    subtopic: Option<String>,
    difficulty: Option<String>,
    question_type: Option<String>,
    open: Option<OpenBlock>,
    outcome: ParseOutcome,
}

/// Parse a document in a single pass.
///
/// Output is ordered by appearance; the pass is finite and not restartable.
pub fn parse_document(content: &str) -> ParseOutcome {
    let mut parser = DocumentParser::default();

    for (idx, line) in content.lines().enumerate() {
        parser.scan_line(idx + 1, line);
    }
    parser.flush();

    parser.outcome
}

impl DocumentParser {
    fn scan_line(&mut self, line_no: usize, line: &str) {
        // Context-changing headings close the current block
        if let Some(rest) = line.strip_prefix(TOPIC_MARKER) {
            self.flush();
            self.topic = Some(rest.trim().to_string());
            return;
        }
        if line.starts_with(DIFFICULTY_MARKER) {
            self.flush();
            let value = line[DIFFICULTY_MARKER.len()..].trim();
            self.difficulty = Some(value.to_string());
            return;
        }
        if line.starts_with(TYPE_MARKER) {
            self.flush();
            let value = line[TYPE_MARKER.len()..].trim();
            self.question_type = Some(value.to_string());
            return;
        }
        if let Some(rest) = line.strip_prefix(SUBTOPIC_MARKER) {
            self.flush();
            // Accept both "## Subtopic (...): Name" and bare "## Name"
            let name = if rest.trim_start().starts_with("Subtopic") {
                rest.split_once(':').map(|(_, n)| n).unwrap_or(rest)
            } else {
                rest
            };
            self.subtopic = Some(name.trim().to_string());
            return;
        }

        let trimmed = line.trim();

        if let Some(pos) = trimmed.find(QUESTION_MARKER) {
            self.flush();
            if self.difficulty.is_some() && self.question_type.is_some() {
                let question = trimmed[pos + QUESTION_MARKER.len()..].trim().to_string();
                self.open = Some(OpenBlock::new(line_no, question));
            } else {
                self.outcome.skipped.push(SkippedBlock {
                    line: line_no,
                    reason: SkipReason::MissingContext,
                });
            }
            return;
        }

        let Some(block) = self.open.as_mut() else {
            return;
        };

        if let Some(pos) = trimmed.find(ANSWER_MARKER) {
            block.section = Section::Answer;
            block.has_answer = true;
            let first = trimmed[pos + ANSWER_MARKER.len()..].trim_start();
            block.answer_lines.push(first.to_string());
            return;
        }
        if let Some(pos) = trimmed.find(NOTES_MARKER) {
            block.section = Section::Notes;
            let first = trimmed[pos + NOTES_MARKER.len()..].trim_start();
            block.notes_lines.push(first.to_string());
            return;
        }

        match block.section {
            // The question field is the marker line itself; free text between
            // the question line and the Answer marker is block filler
            Section::Question => {}
            Section::Answer => block.answer_lines.push(line.to_string()),
            Section::Notes => block.notes_lines.push(line.to_string()),
        }
    }

    /// Close the current block: keep it if both markers are present,
    /// otherwise emit a skip diagnostic.
    fn flush(&mut self) {
        let Some(block) = self.open.take() else {
            return;
        };

        if !block.has_answer {
            self.outcome.skipped.push(SkippedBlock {
                line: block.start_line,
                reason: SkipReason::MissingAnswer,
            });
            return;
        }

        let answer = collapse_blank_runs(&block.answer_lines);
        let notes = collapse_blank_runs(&block.notes_lines);

        self.outcome.blocks.push(QuestionBlock {
            topic: self.topic.clone().unwrap_or_else(|| "Unknown".to_string()),
            subtopic: self.subtopic.clone().unwrap_or_else(|| "Unknown".to_string()),
            // Context presence was checked when the block opened
            difficulty: self.difficulty.clone().unwrap_or_default(),
            question_type: self.question_type.clone().unwrap_or_default(),
            question: block.question,
            answer,
            notes_for_tutor: if notes.is_empty() { None } else { Some(notes) },
            source_line: Some(block.start_line),
        });
    }
}

/// Join lines, collapsing runs of 3+ blank lines to 2 and trimming the ends
fn collapse_blank_runs(lines: &[String]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut blanks = 0usize;

    for line in lines {
        if line.trim().is_empty() {
            blanks += 1;
            if blanks <= 2 {
                out.push("");
            }
        } else {
            blanks = 0;
            out.push(line.as_str());
        }
    }

    out.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_BLOCK: &str = "\
# Topic: Discounted Cash Flow (DCF)

## Subtopic: WACC Calculation

### Difficulty: Basic

#### Type: Question

**Question:** What is WACC?
**Answer:** The weighted average cost of capital.
";

    #[test]
    fn parses_single_block_with_context() {
        let outcome = parse_document(SINGLE_BLOCK);
        assert_eq!(outcome.blocks.len(), 1);
        assert!(outcome.skipped.is_empty());

        let block = &outcome.blocks[0];
        assert_eq!(block.topic, "Discounted Cash Flow (DCF)");
        assert_eq!(block.subtopic, "WACC Calculation");
        assert_eq!(block.difficulty, "Basic");
        assert_eq!(block.question_type, "Question");
        assert_eq!(block.question, "What is WACC?");
        assert_eq!(block.answer, "The weighted average cost of capital.");
        assert_eq!(block.notes_for_tutor, None);
        assert_eq!(block.source_line, Some(9));
    }

    #[test]
    fn question_without_context_is_skipped_with_diagnostic() {
        let doc = "\
# Topic: Accounting

## Subtopic: Revenue

**Question:** What is ASC 606?
**Answer:** The revenue recognition standard.
";
        let outcome = parse_document(doc);
        assert!(outcome.blocks.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].reason, SkipReason::MissingContext);
        assert_eq!(outcome.skipped[0].line, 5);
    }

    #[test]
    fn block_missing_answer_is_dropped_with_diagnostic() {
        let doc = "\
# Topic: Accounting
## Subtopic: Revenue
### Difficulty: Basic
#### Type: Question
**Question:** What is ASC 606?

## Subtopic: Expenses
### Difficulty: Basic
#### Type: Question
**Question:** What is an accrual?
**Answer:** An expense recognized before cash moves.
";
        let outcome = parse_document(doc);
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(outcome.blocks[0].subtopic, "Expenses");
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].reason, SkipReason::MissingAnswer);
        assert_eq!(outcome.skipped[0].line, 5);
    }

    #[test]
    fn answer_spans_to_notes_marker() {
        let doc = "\
# Topic: Valuation
## Subtopic: Terminal Value
### Difficulty: Advanced
#### Type: Problem
**Question:** Walk me through a terminal value calculation.
**Answer:** Take the final-year free cash flow.
Grow it at the perpetuity rate.
**Notes for Tutor:** Expect the Gordon growth formula.
";
        let outcome = parse_document(doc);
        assert_eq!(outcome.blocks.len(), 1);

        let block = &outcome.blocks[0];
        assert_eq!(
            block.answer,
            "Take the final-year free cash flow.\nGrow it at the perpetuity rate."
        );
        assert_eq!(
            block.notes_for_tutor.as_deref(),
            Some("Expect the Gordon growth formula.")
        );
    }

    #[test]
    fn blank_runs_in_answer_collapse_to_two() {
        let doc = "\
# Topic: Valuation
## Subtopic: Terminal Value
### Difficulty: Basic
#### Type: Question
**Question:** What is terminal value?
**Answer:** First paragraph.




Second paragraph.
";
        let outcome = parse_document(doc);
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(
            outcome.blocks[0].answer,
            "First paragraph.\n\n\nSecond paragraph."
        );
    }

    #[test]
    fn multiple_blocks_keep_document_order_and_context() {
        let doc = "\
# Topic: Accounting
## Subtopic: Financial Statements
### Difficulty: Basic
#### Type: Question
**Question:** Name the three financial statements.
**Answer:** Income statement, balance sheet, cash flow statement.

### Difficulty: Advanced
#### Type: Problem
**Question:** Walk through a $10 depreciation change.
**Answer:** Net income falls by $6 at a 40% tax rate.
";
        let outcome = parse_document(doc);
        assert_eq!(outcome.blocks.len(), 2);
        assert_eq!(outcome.blocks[0].difficulty, "Basic");
        assert_eq!(outcome.blocks[1].difficulty, "Advanced");
        assert_eq!(outcome.blocks[1].question_type, "Problem");
        // Subtopic context survives difficulty/type changes
        assert_eq!(outcome.blocks[1].subtopic, "Financial Statements");
    }

    #[test]
    fn bare_subtopic_heading_sets_context() {
        let doc = "\
# Topic: Accounting
## Working Capital
### Difficulty: Basic
#### Type: Question
**Question:** Define working capital.
**Answer:** Current assets minus current liabilities.
";
        let outcome = parse_document(doc);
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(outcome.blocks[0].subtopic, "Working Capital");
    }

    #[test]
    fn parser_accepts_unknown_difficulty_for_validator_to_reject() {
        let doc = "\
# Topic: Accounting
## Subtopic: Revenue
### Difficulty: Medium
#### Type: Question
**Question:** What is revenue?
**Answer:** The top line.
";
        let outcome = parse_document(doc);
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(outcome.blocks[0].difficulty, "Medium");
    }
}
