//! Chart definitions for the report
//!
//! [`stage`] and [`epp`] turn aggregated data into [`Figure`]s; this module
//! writes them into the output directory under fixed file names.

pub mod epp;
pub mod stage;

use crate::common::plots::{render_figure, Figure};
use crate::common::{AggregatedRow, PlotError, PodSample};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

type Result<T> = core::result::Result<T, PlotError>;

/// Report title and output path of each comparison chart, in report order
pub type ChartIndex = Vec<(String, PathBuf)>;

/// Per-pod chart paths keyed by experiment
pub type PodChartIndex = BTreeMap<String, Vec<PathBuf>>;

const STAGE_CHARTS: [(&str, &str, fn(&[AggregatedRow]) -> Figure); 4] = [
    ("Latency vs QPS", "latency_vs_qps.png", stage::latency_vs_qps),
    ("Throughput vs QPS", "throughput_vs_qps.png", stage::throughput_vs_qps),
    ("TTFT p90 vs QPS", "ttft_p90_vs_qps.png", stage::ttft_p90_vs_qps),
    ("Throughput vs Latency", "throughput_vs_latency.png", stage::throughput_vs_latency),
];

const EPP_CHARTS: [(&str, &str, fn(&[PodSample]) -> Figure); 3] = [
    ("Waiting Queue vs Time", "waiting_queue_vs_time.png", epp::waiting_queue_vs_time),
    ("KV Cache Usage vs Time", "kv_cache_usage_vs_time.png", epp::kv_cache_usage_vs_time),
    (
        "EPP Metrics Comparative Analysis",
        "epp_metrics_comparison.png",
        epp::epp_metrics_comparison,
    ),
];

/// Draws `figure` unless it has nothing to show
fn render_if_data(figure: &Figure, output_path: &Path) -> Result<bool> {
    if !figure.has_data() {
        debug!(path = %output_path.display(), "no data, chart skipped");
        return Ok(false);
    }
    render_figure(figure, output_path)?;
    Ok(true)
}

/// Renders the request-rate comparison charts.
///
/// Every chart is listed in the returned index, whether or not it was drawn;
/// the report only embeds the ones present on disk.
pub fn render_stage_charts(rows: &[AggregatedRow], out_dir: &Path) -> Result<ChartIndex> {
    let mut index = ChartIndex::new();
    for (title, file_name, build) in STAGE_CHARTS {
        let path = out_dir.join(file_name);
        if !rows.is_empty() {
            render_if_data(&build(rows), &path)?;
        }
        index.push((title.to_string(), path));
    }
    Ok(index)
}

/// Renders the scheduler charts and one chart per pod.
///
/// Nothing is drawn or listed when there are no samples.
pub fn render_epp_charts(samples: &[PodSample], out_dir: &Path) -> Result<(ChartIndex, PodChartIndex)> {
    let mut index = ChartIndex::new();
    let mut per_pod = PodChartIndex::new();
    if samples.is_empty() {
        return Ok((index, per_pod));
    }

    for (title, file_name, build) in EPP_CHARTS {
        let path = out_dir.join(file_name);
        render_if_data(&build(samples), &path)?;
        index.push((title.to_string(), path));
    }

    for chart in epp::per_pod_charts(samples) {
        let path = out_dir.join(&chart.file_name);
        if render_if_data(&chart.figure, &path)? {
            per_pod.entry(chart.experiment).or_default().push(path);
        }
    }

    Ok((index, per_pod))
}
