//! Domain models for the staging pipeline

pub mod question;
pub mod staging;

pub use question::{CommittedQuestion, NewStagedQuestion, UploadMetadata};
pub use staging::{
    Batch, BatchStatus, DuplicateRecord, DuplicateResolution, QuestionStatus, ReviewAction,
    StagedQuestion,
};
