//! Aggregation of parsed benchmark data
//!
//! Every function here is pure: records in, rows out.
//! - [`aggregate_per_qps`] rolls stage records up per experiment and rate
//! - [`aggregate_epp_by_experiment`] summarises scheduler samples
//! - [`build_summary_across_qps`] collapses each experiment to one row

pub mod aggregate;
pub mod epp;
pub mod stats;
pub mod summary;

pub use aggregate::{aggregate_per_qps, without_stage_zero};
pub use epp::{aggregate_epp_by_experiment, merge_epp_metrics};
pub use summary::build_summary_across_qps;
