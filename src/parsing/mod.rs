//! File discovery and parsing of benchmark artifacts
//!
//! This module handles locating and loading:
//! - stage metric files (`stage_<N>_lifecycle_metrics.json`)
//! - per-request logs used to recompute percentiles
//! - EPP scheduler logs with per-pod queue and KV cache samples
//! - workload profile and scheduler configuration YAML files

pub mod discovery;
pub mod epp_log;
pub mod json;
pub mod per_request;
pub mod stage;

use std::path::PathBuf;
use thiserror::Error;

pub use discovery::{discover_epp_configs, discover_profile_yaml};
pub use epp_log::build_epp_samples;
pub use stage::build_stage_records;

/// Errors that can occur during file parsing
#[derive(Error, Debug)]
pub enum ParsingError {
    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in {}: {source}", path.display())]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = core::result::Result<T, ParsingError>;
