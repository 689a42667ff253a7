//! Run configuration assembled from the command line

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default width (in pixels) of charts embedded into the markdown report
pub const DEFAULT_IMG_WIDTH: u32 = 720;

/// Basis used for the "completed requests per second" column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServedMode {
    /// `(successes + failures) / duration`
    #[default]
    Total,
    /// `successes / duration`
    Successes,
    /// The requests/sec value recorded inside each stage file
    Json,
}

impl FromStr for ServedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "total" => Ok(ServedMode::Total),
            "successes" => Ok(ServedMode::Successes),
            "json" => Ok(ServedMode::Json),
            other => Err(format!(
                "invalid served mode '{}', expected one of: total, successes, json",
                other
            )),
        }
    }
}

impl fmt::Display for ServedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServedMode::Total => write!(f, "total"),
            ServedMode::Successes => write!(f, "successes"),
            ServedMode::Json => write!(f, "json"),
        }
    }
}

/// Everything the pipeline needs to know about a single run
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Root folder containing one sub-folder per experiment
    pub base_dir: PathBuf,
    /// Where CSVs, charts and the report are written
    pub out_dir: PathBuf,
    /// Profile folder under `workload/profiles/` to show in the report
    pub profile_name: Option<String>,
    pub img_width: u32,
    pub served_mode: ServedMode,
    /// Experiment whose overall TTFT the others are compared against
    pub baseline: Option<String>,
    pub skip_stage0: bool,
    /// Restricts EPP log samples to these pod addresses
    pub target_addresses: Option<HashSet<String>>,
}

impl ReportConfig {
    /// Creates a configuration with defaults for everything but the directories
    pub fn new(base_dir: PathBuf, out_dir: PathBuf) -> Self {
        Self {
            base_dir,
            out_dir,
            profile_name: None,
            img_width: DEFAULT_IMG_WIDTH,
            served_mode: ServedMode::default(),
            baseline: None,
            skip_stage0: false,
            target_addresses: None,
        }
    }
}
