//! Pipeline configuration
//!
//! All tunables are injected at construction time; nothing in the pipeline
//! reads global state. A missing config file is not fatal - the pipeline
//! starts with compiled defaults and logs a warning.

use crate::identifier::IdConfig;
use qstage_common::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Tunables for the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Similarity threshold used when checking a batch against the
    /// committed corpus during staging
    #[serde(default = "default_staging_threshold")]
    pub staging_threshold: f64,

    /// Similarity threshold for targeted / full-corpus duplicate scans
    #[serde(default = "default_scan_threshold")]
    pub scan_threshold: f64,

    /// Full-corpus scans are O(n²); refuse corpora larger than this rather
    /// than hiding the cost
    #[serde(default = "default_max_scan_corpus")]
    pub max_scan_corpus: i64,

    /// Bounded retry count for write-time identifier conflicts
    #[serde(default = "default_max_sequence_attempts")]
    pub max_sequence_attempts: u32,

    /// Identifier code tables (topic/subtopic known terms, type codes)
    #[serde(default)]
    pub id: IdConfig,
}

fn default_staging_threshold() -> f64 {
    0.65
}

fn default_scan_threshold() -> f64 {
    0.8
}

fn default_max_scan_corpus() -> i64 {
    5000
}

fn default_max_sequence_attempts() -> u32 {
    10
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            staging_threshold: default_staging_threshold(),
            scan_threshold: default_scan_threshold(),
            max_scan_corpus: default_max_scan_corpus(),
            max_sequence_attempts: default_max_sequence_attempts(),
            id: IdConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found: {}, using defaults", path.display());
            return Ok(Self::default());
        }
        qstage_common::config::load_toml(path)
    }
}
