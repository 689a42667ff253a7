//! Recomputing token totals and latency percentiles from per-request records
//!
//! Some emitters write bogus (zero) TTFT/ITL percentiles into the stage file,
//! so the per-request log is used as a second source of truth.

use super::json::{as_count, as_f64, lookup};
use crate::analysis::stats::percentile;
use crate::common::PerRequestStats;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Name of the per-request log that sits next to the stage files
pub const PER_REQUEST_FILE_NAME: &str = "per_request_lifecycle_metrics.json";

/// Reads `<stage_dir>/per_request_lifecycle_metrics.json`.
///
/// A missing or unreadable file yields zero totals and no percentiles.
pub fn read_per_request_stats(stage_dir: &Path) -> PerRequestStats {
    let path = stage_dir.join(PER_REQUEST_FILE_NAME);
    match fs::read_to_string(&path) {
        Ok(text) => per_request_stats_from_str(&text),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no per-request metrics");
            PerRequestStats::default()
        }
    }
}

/// Computes [`PerRequestStats`] from the contents of a per-request log.
///
/// Only successful requests (no `error`, or `"error": null`) contribute.
pub fn per_request_stats_from_str(text: &str) -> PerRequestStats {
    let mut stats = PerRequestStats::default();
    let mut ttft_samples = Vec::new();
    let mut itl_samples = Vec::new();

    for request in iter_requests(text) {
        let Some(object) = request.as_object() else {
            continue;
        };
        if object.get("error").is_some_and(|e| !e.is_null()) {
            continue;
        }

        stats.input_tokens_total += lookup(&request, &["info", "input_tokens"])
            .map(as_count)
            .unwrap_or(0);
        stats.output_tokens_total += lookup(&request, &["info", "output_tokens"])
            .map(as_count)
            .unwrap_or(0);

        let Some(token_times) = lookup(&request, &["info", "output_token_times"])
            .and_then(Value::as_array)
            .filter(|times| !times.is_empty())
        else {
            continue;
        };

        let token_starts = token_start_times(token_times);
        let start_time = object.get("start_time").and_then(as_f64);

        if let (Some(start), Some(&first)) = (start_time, token_starts.first()) {
            let ttft = first - start;
            if ttft >= 0.0 {
                ttft_samples.push(ttft);
            }
        }

        itl_samples.extend(
            token_starts
                .windows(2)
                .map(|pair| pair[1] - pair[0])
                .filter(|gap| *gap >= 0.0),
        );
    }

    stats.ttft_p50_s = percentile(&ttft_samples, 50.0);
    stats.ttft_p90_s = percentile(&ttft_samples, 90.0);
    stats.itl_p50_s = percentile(&itl_samples, 50.0);
    stats.itl_p90_s = percentile(&itl_samples, 90.0);
    stats
}

/// Token start times from `output_token_times`.
///
/// Some emitters log start/end pairs `[t1, t1, t2, t2, ...]`; when the first
/// two entries are equal every other entry is taken.
fn token_start_times(times: &[Value]) -> Vec<f64> {
    let paired = times.len() >= 2 && as_f64(&times[0]).is_some_and(|first| as_f64(&times[1]) == Some(first));
    let step = if paired { 2 } else { 1 };

    times.iter().step_by(step).filter_map(as_f64).collect()
}

/// Request objects from either a JSON array or newline-delimited JSON
fn iter_requests(text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    if text.trim_start().starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) {
            return items;
        }
    }

    text.lines()
        .map(|line| line.trim().trim_end_matches(',').trim_end())
        .filter(|line| !line.is_empty() && *line != "[" && *line != "]")
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
