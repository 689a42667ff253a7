//! Files written into the output directory
//!
//! - CSV tables of aggregated rows, EPP samples and EPP summaries
//! - The markdown report tying charts and tables together
//! - The end-of-run console summary

pub mod console;
pub mod markdown;
pub mod tables;

use std::path::PathBuf;
use thiserror::Error;

pub use console::{format_summary_table, format_written, WrittenFiles};
pub use markdown::{write_markdown_report, ReportInputs};
pub use tables::{write_analysis_metrics, write_epp_samples, write_epp_summaries};

/// Errors that can occur while writing output files
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = core::result::Result<T, ReportError>;
