//! # QStage Ingest
//!
//! Bulk question ingestion pipeline: structural parsing of semi-structured
//! Q&A documents, validation, semantic identifier generation, near-duplicate
//! detection, and the staging/review workflow that promotes questions into
//! the committed store.
//!
//! Data flows strictly parser → validator → identifier → staged store →
//! duplicate detector → staging workflow → committed store.

pub mod config;
pub mod db;
pub mod dedup;
pub mod identifier;
pub mod models;
pub mod parser;
pub mod staging;
pub mod validator;

pub use config::PipelineConfig;
pub use staging::StagingService;
