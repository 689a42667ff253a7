//! CSV tables
//!
//! Columns follow the field order of the serialized row types. Missing values
//! are written as empty fields.

use super::{ReportError, Result};
use crate::common::{AggregatedRow, EppSummary, PodSample};
use serde::Serialize;
use std::path::Path;

/// One line of `analysis_metrics.csv`: an aggregated row with the
/// experiment's EPP summary flattened into trailing columns
#[derive(Debug, Serialize)]
struct AnalysisMetricsRow<'a> {
    experiment: &'a str,
    requested_qps: f64,
    successes: u64,
    failures: u64,
    duration_s: Option<f64>,
    achieved_rps_json: Option<f64>,
    ttft_mean_s: Option<f64>,
    itl_mean_s: Option<f64>,
    ttft_p50_s: Option<f64>,
    ttft_p90_s: Option<f64>,
    itl_p50_s: Option<f64>,
    itl_p90_s: Option<f64>,
    input_tokens_total: u64,
    output_tokens_total: u64,
    input_toks_per_sec_json: Option<f64>,
    output_toks_per_sec_json: Option<f64>,
    total_toks_per_sec_json: Option<f64>,
    total_completed: u64,
    success_rate: Option<f64>,
    completed_rps_total: Option<f64>,
    completed_rps_successes: Option<f64>,
    completed_rps: Option<f64>,
    output_toks_per_sec: Option<f64>,
    input_toks_per_sec: Option<f64>,
    total_toks_per_sec: Option<f64>,
    input_toks_per_sec_plot: Option<f64>,
    output_toks_per_sec_plot: Option<f64>,
    total_toks_per_sec_plot: Option<f64>,
    norm_time_per_output_token_s: Option<f64>,
    waiting_queue_size_mean: Option<f64>,
    waiting_queue_size_p50: Option<f64>,
    waiting_queue_size_p90: Option<f64>,
    waiting_queue_size_max: Option<f64>,
    kv_cache_usage_percent_mean: Option<f64>,
    kv_cache_usage_percent_p50: Option<f64>,
    kv_cache_usage_percent_p90: Option<f64>,
    kv_cache_usage_percent_max: Option<f64>,
    num_pods: Option<usize>,
    num_data_points: Option<usize>,
    time_span_minutes: Option<f64>,
}

impl<'a> From<&'a AggregatedRow> for AnalysisMetricsRow<'a> {
    fn from(row: &'a AggregatedRow) -> Self {
        let epp = row.epp.as_ref();
        Self {
            experiment: &row.experiment,
            requested_qps: row.requested_qps,
            successes: row.successes,
            failures: row.failures,
            duration_s: row.duration_s,
            achieved_rps_json: row.achieved_rps_json,
            ttft_mean_s: row.ttft_mean_s,
            itl_mean_s: row.itl_mean_s,
            ttft_p50_s: row.ttft_p50_s,
            ttft_p90_s: row.ttft_p90_s,
            itl_p50_s: row.itl_p50_s,
            itl_p90_s: row.itl_p90_s,
            input_tokens_total: row.input_tokens_total,
            output_tokens_total: row.output_tokens_total,
            input_toks_per_sec_json: row.input_toks_per_sec_json,
            output_toks_per_sec_json: row.output_toks_per_sec_json,
            total_toks_per_sec_json: row.total_toks_per_sec_json,
            total_completed: row.total_completed,
            success_rate: row.success_rate,
            completed_rps_total: row.completed_rps_total,
            completed_rps_successes: row.completed_rps_successes,
            completed_rps: row.completed_rps,
            output_toks_per_sec: row.output_toks_per_sec,
            input_toks_per_sec: row.input_toks_per_sec,
            total_toks_per_sec: row.total_toks_per_sec,
            input_toks_per_sec_plot: row.input_toks_per_sec_plot,
            output_toks_per_sec_plot: row.output_toks_per_sec_plot,
            total_toks_per_sec_plot: row.total_toks_per_sec_plot,
            norm_time_per_output_token_s: row.norm_time_per_output_token_s,
            waiting_queue_size_mean: epp.map(|e| e.waiting_queue_size_mean),
            waiting_queue_size_p50: epp.map(|e| e.waiting_queue_size_p50),
            waiting_queue_size_p90: epp.map(|e| e.waiting_queue_size_p90),
            waiting_queue_size_max: epp.map(|e| e.waiting_queue_size_max),
            kv_cache_usage_percent_mean: epp.map(|e| e.kv_cache_usage_percent_mean),
            kv_cache_usage_percent_p50: epp.map(|e| e.kv_cache_usage_percent_p50),
            kv_cache_usage_percent_p90: epp.map(|e| e.kv_cache_usage_percent_p90),
            kv_cache_usage_percent_max: epp.map(|e| e.kv_cache_usage_percent_max),
            num_pods: epp.map(|e| e.num_pods),
            num_data_points: epp.map(|e| e.num_data_points),
            time_span_minutes: epp.map(|e| e.time_span_minutes),
        }
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let csv_error = |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Writes `analysis_metrics.csv`. With no rows the file is created empty.
pub fn write_analysis_metrics(rows: &[AggregatedRow], path: &Path) -> Result<()> {
    write_rows(path, rows.iter().map(AnalysisMetricsRow::from))
}

/// Writes `epp_log_metrics.csv`, one line per pod sample
pub fn write_epp_samples(samples: &[PodSample], path: &Path) -> Result<()> {
    write_rows(path, samples)
}

/// Writes `epp_log_metrics_summary.csv`, one line per experiment
pub fn write_epp_summaries(summaries: &[EppSummary], path: &Path) -> Result<()> {
    write_rows(path, summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs::read_to_string;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn writes_aggregated_rows_with_epp_columns() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("analysis_metrics.csv");

        let rows = vec![
            AggregatedRow {
                experiment: "a".to_string(),
                requested_qps: 2.0,
                successes: 9,
                failures: 1,
                duration_s: Some(5.0),
                epp: Some(EppSummary {
                    experiment: "a".to_string(),
                    waiting_queue_size_mean: 1.5,
                    num_pods: 2,
                    ..EppSummary::default()
                }),
                ..AggregatedRow::default()
            },
            AggregatedRow {
                experiment: "b".to_string(),
                requested_qps: 1.0,
                ..AggregatedRow::default()
            },
        ];
        write_analysis_metrics(&rows, &path).unwrap();

        let text = read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("experiment,requested_qps,successes,failures,duration_s,"));
        assert!(lines[0].ends_with(",num_pods,num_data_points,time_span_minutes"));
        assert!(lines[1].starts_with("a,2.0,9,1,5.0,"));
        assert!(lines[1].contains(",1.5,"));
        assert!(lines[2].starts_with("b,1.0,0,0,,"));
        assert!(lines[2].ends_with(",,,"));
    }

    #[test]
    fn writes_pod_samples() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("epp_log_metrics.csv");
        let timestamp = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();

        let samples = vec![PodSample {
            experiment: "a".to_string(),
            timestamp,
            pod_update_time: timestamp,
            pod_name: "vllm-0".to_string(),
            pod_address: "10.0.0.1".to_string(),
            waiting_queue_size: 3.0,
            kv_cache_usage_percent: 0.5,
            epp_log_path: PathBuf::from("a/epp.log"),
        }];
        write_epp_samples(&samples, &path).unwrap();

        let text = read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("experiment,timestamp,pod_update_time,pod_name,pod_address,waiting_queue_size,kv_cache_usage_percent,epp_log_path")
        );
        assert_eq!(
            lines.next(),
            Some("a,2025-01-01T10:00:00Z,2025-01-01T10:00:00Z,vllm-0,10.0.0.1,3.0,0.5,a/epp.log")
        );
    }

    #[test]
    fn empty_input_creates_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("analysis_metrics.csv");
        write_analysis_metrics(&[], &path).unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("out.csv");
        let result = write_epp_summaries(&[EppSummary::default()], &path);
        assert!(matches!(result, Err(ReportError::Csv { .. })));
    }
}
