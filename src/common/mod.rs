//! Common infrastructure shared across the pipeline
//!
//! This module provides:
//! - Data structures flowing from parsing through to the report
//! - Generic multi-panel chart rendering

pub mod data_structures;
pub mod plots;

// Re-export commonly used items
pub use data_structures::{
    AggregatedRow, EppSummary, PerRequestStats, PodSample, StageRecord, SummaryRow,
};
pub use plots::PlotError;
