//! Parsing `stage_<N>_lifecycle_metrics.json` files into [`StageRecord`]s

use super::discovery::{experiment_label, find_stage_files, stage_index};
use super::json::{count_at, f64_at};
use super::per_request::read_per_request_stats;
use super::{ParsingError, Result};
use crate::common::{PerRequestStats, StageRecord};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const TTFT: &[&str] = &["successes", "latency", "time_to_first_token"];
const ITL: &[&str] = &["successes", "latency", "inter_token_latency"];
const REQUEST_LATENCY: &[&str] = &["successes", "latency", "request_latency"];
const THROUGHPUT: &[&str] = &["successes", "throughput"];

/// Parses a single stage file, supplementing bogus percentiles with values
/// recomputed from the per-request log in the same directory.
pub fn parse_stage_file(base_dir: &Path, path: &Path) -> Result<StageRecord> {
    let text = fs::read_to_string(path).map_err(|e| ParsingError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let data: Value = serde_json::from_str(&text).map_err(|e| ParsingError::JsonParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let stage_dir = path.parent().unwrap_or(Path::new("."));
    let per_request = read_per_request_stats(stage_dir);

    let mut record = stage_record_from_value(&data, &per_request);
    record.experiment = experiment_label(base_dir, path);
    record.stage_index = stage_index(path);
    record.source_path = path.to_path_buf();
    Ok(record)
}

/// Builds the metric fields of a [`StageRecord`] from a parsed stage document.
///
/// Identity fields (`experiment`, `stage_index`, `source_path`) are left at
/// their defaults.
pub fn stage_record_from_value(data: &Value, per_request: &PerRequestStats) -> StageRecord {
    let metric = |base: &[&str], key: &str| metric_at(data, base, key);

    let successes = count_at(data, &["successes", "count"]);
    let failures = count_at(data, &["failures", "count"]);
    let total = successes + failures;

    StageRecord {
        requested_qps: f64_at(data, &["load_summary", "requested_rate"]),
        send_duration_s: f64_at(data, &["load_summary", "send_duration"]),

        achieved_rps_json: metric(THROUGHPUT, "requests_per_sec"),
        input_toks_per_sec_json: metric(THROUGHPUT, "input_tokens_per_sec"),
        output_toks_per_sec_json: metric(THROUGHPUT, "output_tokens_per_sec"),
        total_toks_per_sec_json: metric(THROUGHPUT, "total_tokens_per_sec"),

        ttft_mean_s: metric(TTFT, "mean"),
        ttft_p50_s: with_fallback(metric(TTFT, "p50"), per_request.ttft_p50_s),
        ttft_p90_s: with_fallback(metric(TTFT, "p90"), per_request.ttft_p90_s),
        itl_mean_s: metric(ITL, "mean"),
        itl_p50_s: with_fallback(metric(ITL, "p50"), per_request.itl_p50_s),
        itl_p90_s: with_fallback(metric(ITL, "p90"), per_request.itl_p90_s),
        request_latency_p50_s: metric(REQUEST_LATENCY, "p50"),

        successes,
        failures,
        success_rate: (total > 0).then(|| successes as f64 / total as f64),

        input_tokens_total: per_request.input_tokens_total,
        output_tokens_total: per_request.output_tokens_total,
        ..StageRecord::default()
    }
}

fn metric_at(data: &Value, base: &[&str], key: &str) -> Option<f64> {
    let path: Vec<&str> = base.iter().copied().chain(std::iter::once(key)).collect();
    f64_at(data, &path)
}

/// Replaces a missing or exactly-zero reported percentile with the
/// recomputed one, when there is one
fn with_fallback(reported: Option<f64>, computed: Option<f64>) -> Option<f64> {
    match reported {
        Some(value) if value != 0.0 => Some(value),
        _ => computed.or(reported),
    }
}

/// Parses every stage file below `base_dir`.
///
/// Files that cannot be read or parsed are skipped with a warning. The
/// result is ordered by experiment, requested rate and stage index.
pub fn build_stage_records(base_dir: &Path) -> Result<Vec<StageRecord>> {
    let files = find_stage_files(base_dir).map_err(|e| ParsingError::FileRead {
        path: base_dir.to_path_buf(),
        source: e,
    })?;
    info!(count = files.len(), "found stage files");

    let progress = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} stage files") {
        progress.set_style(style);
    }

    let mut records = Vec::with_capacity(files.len());
    for path in &files {
        match parse_stage_file(base_dir, path) {
            Ok(record) => records.push(record),
            Err(e) => warn!("skipping stage file: {}", e),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    sort_stage_records(&mut records);
    Ok(records)
}

/// Orders records by experiment, requested rate and stage index, with
/// missing values last
pub fn sort_stage_records(records: &mut [StageRecord]) {
    records.sort_by(|a, b| {
        a.experiment
            .cmp(&b.experiment)
            .then_with(|| cmp_missing_last(a.requested_qps, b.requested_qps))
            .then_with(|| match (a.stage_index, b.stage_index) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
}

/// Ascending comparison of optional floats that places [`None`] last
pub fn cmp_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    fn stage_json(rate: f64, ttft_p50: f64) -> Value {
        json!({
            "load_summary": {"requested_rate": rate, "send_duration": 60.0},
            "successes": {
                "count": 90,
                "latency": {
                    "time_to_first_token": {"mean": 0.2, "p50": ttft_p50, "p90": 0.4},
                    "inter_token_latency": {"mean": 0.02, "p50": 0.0, "p90": null},
                    "request_latency": {"p50": 3.5}
                },
                "throughput": {
                    "requests_per_sec": 1.5,
                    "input_tokens_per_sec": 100.0,
                    "output_tokens_per_sec": 50.0,
                    "total_tokens_per_sec": 150.0
                }
            },
            "failures": {"count": 10}
        })
    }

    #[test]
    fn extracts_stage_metrics() {
        let record = stage_record_from_value(&stage_json(2.0, 0.15), &PerRequestStats::default());

        assert_eq!(record.requested_qps, Some(2.0));
        assert_eq!(record.send_duration_s, Some(60.0));
        assert_eq!(record.achieved_rps_json, Some(1.5));
        assert_eq!(record.output_toks_per_sec_json, Some(50.0));
        assert_eq!(record.ttft_mean_s, Some(0.2));
        assert_eq!(record.ttft_p50_s, Some(0.15));
        assert_eq!(record.request_latency_p50_s, Some(3.5));
        assert_eq!(record.successes, 90);
        assert_eq!(record.failures, 10);
        assert_eq!(record.success_rate, Some(0.9));
        // Zero with nothing to fall back on stays zero; null stays absent
        assert_eq!(record.itl_p50_s, Some(0.0));
        assert_eq!(record.itl_p90_s, None);
    }

    #[test]
    fn falls_back_to_recomputed_percentiles() {
        let per_request = PerRequestStats {
            input_tokens_total: 1000,
            output_tokens_total: 500,
            ttft_p50_s: Some(0.11),
            ttft_p90_s: Some(0.33),
            itl_p50_s: Some(0.01),
            itl_p90_s: Some(0.03),
        };
        let record = stage_record_from_value(&stage_json(2.0, 0.0), &per_request);

        assert_eq!(record.ttft_p50_s, Some(0.11));
        // Non-zero reported values win
        assert_eq!(record.ttft_p90_s, Some(0.4));
        assert_eq!(record.itl_p50_s, Some(0.01));
        assert_eq!(record.itl_p90_s, Some(0.03));
        assert_eq!(record.input_tokens_total, 1000);
        assert_eq!(record.output_tokens_total, 500);
    }

    #[test]
    fn tolerates_empty_documents() {
        let record = stage_record_from_value(&json!({}), &PerRequestStats::default());

        assert_eq!(record.requested_qps, None);
        assert_eq!(record.successes, 0);
        assert_eq!(record.success_rate, None);
    }

    #[test]
    fn builds_sorted_records_and_skips_malformed_files() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let stage_dir = base.join("exp-a/results/run");
        create_dir_all(&stage_dir).unwrap();
        create_dir_all(base.join("exp-b")).unwrap();

        write(stage_dir.join("stage_1_lifecycle_metrics.json"), stage_json(4.0, 0.1).to_string()).unwrap();
        write(stage_dir.join("stage_0_lifecycle_metrics.json"), stage_json(2.0, 0.1).to_string()).unwrap();
        write(base.join("exp-b/stage_0_lifecycle_metrics.json"), "{ not json").unwrap();
        write(
            stage_dir.join("per_request_lifecycle_metrics.json"),
            r#"[{"start_time": 0.0, "info": {"input_tokens": 3, "output_tokens": 4, "output_token_times": [0.1]}}]"#,
        )
        .unwrap();

        let records = build_stage_records(base).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].experiment, "exp-a");
        assert_eq!(records[0].stage_index, Some(0));
        assert_eq!(records[0].requested_qps, Some(2.0));
        assert_eq!(records[1].stage_index, Some(1));
        assert_eq!(records[0].output_tokens_total, 4);
    }

    #[test]
    fn missing_values_sort_last() {
        assert_eq!(cmp_missing_last(Some(1.0), None), Ordering::Less);
        assert_eq!(cmp_missing_last(None, Some(1.0)), Ordering::Greater);
        assert_eq!(cmp_missing_last(Some(2.0), Some(1.0)), Ordering::Greater);
    }
}
