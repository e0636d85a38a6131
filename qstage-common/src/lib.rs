//! # QStage Common Library
//!
//! Shared code for the question staging pipeline including:
//! - Error taxonomy used across all pipeline crates
//! - Configuration file loading and database path resolution
//! - Database initialization and table schemas

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
