use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Flat record for a single `stage_<N>_lifecycle_metrics.json` file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageRecord {
    /// Top-level directory under the base directory
    pub experiment: String,
    /// `<N>` from the stage file name
    pub stage_index: Option<u32>,
    /// Target request rate configured for the stage
    pub requested_qps: Option<f64>,
    /// Time the load generator spent sending requests
    pub send_duration_s: Option<f64>,

    /// Requests/sec as recorded by the load generator
    pub achieved_rps_json: Option<f64>,
    pub input_toks_per_sec_json: Option<f64>,
    pub output_toks_per_sec_json: Option<f64>,
    pub total_toks_per_sec_json: Option<f64>,

    pub ttft_mean_s: Option<f64>,
    pub ttft_p50_s: Option<f64>,
    pub ttft_p90_s: Option<f64>,
    pub itl_mean_s: Option<f64>,
    pub itl_p50_s: Option<f64>,
    pub itl_p90_s: Option<f64>,
    pub request_latency_p50_s: Option<f64>,

    pub successes: u64,
    pub failures: u64,
    pub success_rate: Option<f64>,

    /// Token totals from the per-request file (successful requests only)
    pub input_tokens_total: u64,
    pub output_tokens_total: u64,

    pub source_path: PathBuf,
}

/// Totals and recomputed percentiles from `per_request_lifecycle_metrics.json`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerRequestStats {
    pub input_tokens_total: u64,
    pub output_tokens_total: u64,
    pub ttft_p50_s: Option<f64>,
    pub ttft_p90_s: Option<f64>,
    pub itl_p50_s: Option<f64>,
    pub itl_p90_s: Option<f64>,
}

/// All stage files of one experiment at one requested rate, rolled together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedRow {
    pub experiment: String,
    pub requested_qps: f64,

    pub successes: u64,
    pub failures: u64,
    pub duration_s: Option<f64>,

    pub achieved_rps_json: Option<f64>,
    pub ttft_mean_s: Option<f64>,
    pub itl_mean_s: Option<f64>,
    pub ttft_p50_s: Option<f64>,
    pub ttft_p90_s: Option<f64>,
    pub itl_p50_s: Option<f64>,
    pub itl_p90_s: Option<f64>,

    pub input_tokens_total: u64,
    pub output_tokens_total: u64,
    pub input_toks_per_sec_json: Option<f64>,
    pub output_toks_per_sec_json: Option<f64>,
    pub total_toks_per_sec_json: Option<f64>,

    pub total_completed: u64,
    pub success_rate: Option<f64>,
    pub completed_rps_total: Option<f64>,
    pub completed_rps_successes: Option<f64>,
    /// Completed requests/sec on the basis chosen by [`ServedMode`](crate::config::ServedMode)
    pub completed_rps: Option<f64>,

    /// Tokens/sec derived from token totals over the send window
    pub input_toks_per_sec: Option<f64>,
    pub output_toks_per_sec: Option<f64>,
    pub total_toks_per_sec: Option<f64>,

    /// Tokens/sec used for plotting: JSON-reported when finite, derived otherwise
    pub input_toks_per_sec_plot: Option<f64>,
    pub output_toks_per_sec_plot: Option<f64>,
    pub total_toks_per_sec_plot: Option<f64>,

    /// Seconds of send window per generated output token. Lower is better.
    pub norm_time_per_output_token_s: Option<f64>,

    /// Scheduler metrics of the whole experiment, when an EPP log was found
    pub epp: Option<EppSummary>,
}

/// One row per experiment, collapsing every requested rate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryRow {
    pub experiment: String,
    pub qps_points: usize,
    pub successes: u64,
    pub failures: u64,
    pub duration_s: Option<f64>,
    pub completed_rps_overall: Option<f64>,
    pub output_tokens_total: u64,
    pub input_tokens_total: u64,
    pub output_toks_per_sec_overall: Option<f64>,
    pub input_toks_per_sec_overall: Option<f64>,
    pub ttft_mean_s_overall: Option<f64>,
    pub itl_mean_s_overall: Option<f64>,
    pub ttft_p50_s_overall: Option<f64>,
    pub ttft_p90_s_overall: Option<f64>,
    pub itl_p50_s_overall: Option<f64>,
    pub itl_p90_s_overall: Option<f64>,
    pub success_rate_overall: Option<f64>,
    pub epp: Option<EppSummary>,
    /// Negative means faster than the baseline experiment
    pub ttft_delta_vs_baseline_pct: Option<f64>,
}

/// A single pod's scheduler state extracted from one EPP log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodSample {
    pub experiment: String,
    pub timestamp: DateTime<Utc>,
    pub pod_update_time: DateTime<Utc>,
    pub pod_name: String,
    pub pod_address: String,
    pub waiting_queue_size: f64,
    /// Fraction in `0.0..=1.0`
    pub kv_cache_usage_percent: f64,
    pub epp_log_path: PathBuf,
}

/// Queue depth and KV cache utilisation statistics for one experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EppSummary {
    pub experiment: String,
    pub waiting_queue_size_mean: f64,
    pub waiting_queue_size_p50: f64,
    pub waiting_queue_size_p90: f64,
    pub waiting_queue_size_max: f64,
    pub kv_cache_usage_percent_mean: f64,
    pub kv_cache_usage_percent_p50: f64,
    pub kv_cache_usage_percent_p90: f64,
    pub kv_cache_usage_percent_max: f64,
    pub num_pods: usize,
    pub num_data_points: usize,
    pub time_span_minutes: f64,
}
