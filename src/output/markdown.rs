//! The `benchmark_report.md` report
//!
//! Section order:
//! 1. workload profile and scheduler configurations (verbatim YAML)
//! 2. charts, a short reading guide, the summary across rates and the EPP
//!    summary (only when there is data)
//! 3. one table per requested rate
//! 4. per-pod EPP charts

use super::{ReportError, Result};
use crate::analysis::build_summary_across_qps;
use crate::charts::{ChartIndex, PodChartIndex};
use crate::common::{AggregatedRow, EppSummary, SummaryRow};
use crate::config::ServedMode;
use crate::parsing::stage::cmp_missing_last;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};
use tabled::{Table, Tabled};

pub const REPORT_FILE_NAME: &str = "benchmark_report.md";
const REPORT_TITLE: &str = "Inference-Perf Benchmark Report";
const UNREADABLE: &str = "(file unreadable)";

/// Everything the report draws from
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub rows: &'a [AggregatedRow],
    pub epp_summaries: &'a [EppSummary],
    pub charts: &'a ChartIndex,
    pub per_pod_charts: &'a PodChartIndex,
    pub profile_yaml: Option<&'a Path>,
    /// `(experiment, epp_config.yaml)`
    pub epp_configs: &'a [(String, PathBuf)],
    pub img_width: u32,
    pub served_mode: ServedMode,
    pub baseline: Option<&'a str>,
}

/// One experiment's line in the summary and per-rate tables
#[derive(Debug, Clone, Tabled)]
struct ResultLine {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "Output toks/s")]
    output_toks_per_sec: String,
    #[tabled(rename = "Requests/s")]
    requests_per_sec: String,
    #[tabled(rename = "Success Rate")]
    success_rate: String,
    #[tabled(rename = "TTFT p90 (s)")]
    ttft_p90: String,
    #[tabled(rename = "TTFT mean (s)")]
    ttft_mean: String,
    #[tabled(rename = "ITL mean (s)")]
    itl_mean: String,
    #[tabled(rename = "ITL p50/ p90 (s)")]
    itl_percentiles: String,
}

#[derive(Debug, Clone, Tabled)]
struct EppLine {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "Wait Queue (mean/p90/max)")]
    wait_queue: String,
    #[tabled(rename = "KV Cache % (mean/p90/max)")]
    kv_cache: String,
    #[tabled(rename = "Pods")]
    pods: usize,
    #[tabled(rename = "Data Points")]
    data_points: usize,
}

#[derive(Debug, Clone, Tabled)]
struct BaselineLine {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "TTFT mean (s)")]
    ttft_mean: String,
    #[tabled(rename = "Δ TTFT vs baseline (%)")]
    delta: String,
}

fn fixed(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(String::new, |v| format!("{:.*}", precision, v))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn itl_percentiles(p50: Option<f64>, p90: Option<f64>) -> String {
    match (p50, p90) {
        (Some(p50), Some(p90)) => format!("{:.4}/{:.3}", p50, p90),
        _ => String::new(),
    }
}

impl From<&SummaryRow> for ResultLine {
    fn from(row: &SummaryRow) -> Self {
        Self {
            experiment: row.experiment.clone(),
            output_toks_per_sec: fixed(row.output_toks_per_sec_overall, 1),
            requests_per_sec: fixed(row.completed_rps_overall, 3),
            success_rate: percent(row.success_rate_overall),
            ttft_p90: fixed(row.ttft_p90_s_overall, 3),
            ttft_mean: fixed(row.ttft_mean_s_overall, 3),
            itl_mean: fixed(row.itl_mean_s_overall, 3),
            itl_percentiles: itl_percentiles(row.itl_p50_s_overall, row.itl_p90_s_overall),
        }
    }
}

impl From<&AggregatedRow> for ResultLine {
    fn from(row: &AggregatedRow) -> Self {
        Self {
            experiment: row.experiment.clone(),
            output_toks_per_sec: fixed(row.output_toks_per_sec_plot, 1),
            requests_per_sec: fixed(row.completed_rps, 3),
            success_rate: percent(row.success_rate),
            ttft_p90: fixed(row.ttft_p90_s, 3),
            ttft_mean: fixed(row.ttft_mean_s, 3),
            itl_mean: fixed(row.itl_mean_s, 3),
            itl_percentiles: itl_percentiles(row.itl_p50_s, row.itl_p90_s),
        }
    }
}

impl From<&EppSummary> for EppLine {
    fn from(summary: &EppSummary) -> Self {
        Self {
            experiment: summary.experiment.clone(),
            wait_queue: format!(
                "{:.1}/{:.0}/{:.0}",
                summary.waiting_queue_size_mean,
                summary.waiting_queue_size_p90,
                summary.waiting_queue_size_max
            ),
            kv_cache: format!(
                "{:.1}/{:.1}/{:.1}",
                summary.kv_cache_usage_percent_mean * 100.0,
                summary.kv_cache_usage_percent_p90 * 100.0,
                summary.kv_cache_usage_percent_max * 100.0
            ),
            pods: summary.num_pods,
            data_points: summary.num_data_points,
        }
    }
}

/// Renders rows as a markdown table with right-aligned value columns
fn markdown_table<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows)
        .with(Style::markdown())
        .modify(Columns::new(1..), Alignment::right())
        .to_string()
}

/// Requested rates as floats that always keep a fractional part: `1.0`, `0.5`
fn format_qps(qps: f64) -> String {
    format!("{:?}", qps)
}

fn read_or_placeholder(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|_| UNREADABLE.to_string())
}

fn relative_to<'a>(path: &'a Path, out_dir: &Path) -> &'a Path {
    path.strip_prefix(out_dir).unwrap_or(path)
}

/// Descending with missing values last
fn cmp_descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        _ => cmp_missing_last(a, b),
    }
}

fn push_yaml_block(lines: &mut Vec<String>, text: &str) {
    lines.push("```yaml".to_string());
    lines.push(text.trim_end().to_string());
    lines.push("```\n".to_string());
}

fn push_configuration(lines: &mut Vec<String>, inputs: &ReportInputs<'_>) {
    lines.push("### Workload profile\n".to_string());
    match inputs.profile_yaml {
        Some(path) => push_yaml_block(lines, &read_or_placeholder(path)),
        None => lines.push("_No profile YAML found._\n".to_string()),
    }

    lines.push("### Scheduler Configurations\n".to_string());
    if inputs.epp_configs.is_empty() {
        lines.push("_No epp_config.yaml files found under experiments._\n".to_string());
        return;
    }

    let mut configs: Vec<&(String, PathBuf)> = inputs.epp_configs.iter().collect();
    configs.sort_by(|a, b| a.0.cmp(&b.0));
    for (label, path) in configs {
        lines.push(format!("**{}**\n", label));
        push_yaml_block(lines, &read_or_placeholder(path));
    }
}

fn push_charts(lines: &mut Vec<String>, inputs: &ReportInputs<'_>, out_dir: &Path) {
    if inputs.charts.is_empty() {
        return;
    }

    lines.push("## Charts\n".to_string());
    for (title, path) in inputs.charts.iter().filter(|(_, path)| path.exists()) {
        lines.push(format!("### {}\n", title));
        lines.push(format!(
            "<img src=\"{}\" alt=\"{}\" width=\"{}\"/>\n",
            relative_to(path, out_dir).display(),
            title,
            inputs.img_width
        ));
    }
}

fn push_reading_guide(lines: &mut Vec<String>) {
    lines.push("### How to read this report (quick)\n".to_string());
    lines.push("- **Output tokens/sec** is the primary throughput metric (higher is better).\n".to_string());
    lines.push("- **Requests/sec** shows the rate of completed requests.\n".to_string());
    lines.push("- **Success Rate** reflects outcome quality, not volume.\n".to_string());
    lines.push(
        "- **TTFT** is time to first token; **ITL** is the gap between tokens (both lower is better).\n"
            .to_string(),
    );
    lines.push("- **Queue sizes** and **KV cache usage** show resource utilization patterns.\n".to_string());
    lines.push(String::new());
}

fn push_summary(lines: &mut Vec<String>, inputs: &ReportInputs<'_>) {
    let summary = build_summary_across_qps(inputs.rows, inputs.served_mode, inputs.baseline);

    lines.push("### Summary across QPS\n".to_string());
    lines.push(markdown_table(summary.iter().map(ResultLine::from)));

    if let Some(baseline) = inputs.baseline {
        if summary.iter().any(|row| row.ttft_delta_vs_baseline_pct.is_some()) {
            lines.push(format!("\n### TTFT vs baseline `{}`\n", baseline));
            lines.push("Negative means faster than the baseline.\n".to_string());
            lines.push(markdown_table(summary.iter().map(|row| BaselineLine {
                experiment: row.experiment.clone(),
                ttft_mean: fixed(row.ttft_mean_s_overall, 3),
                delta: row
                    .ttft_delta_vs_baseline_pct
                    .map_or_else(String::new, |d| format!("{:+.1}", d)),
            })));
        }
    }

    if !inputs.epp_summaries.is_empty() {
        lines.push("\n### EPP Queue and KV Cache Metrics Summary\n".to_string());
        lines.push(markdown_table(inputs.epp_summaries.iter().map(EppLine::from)));
    }
}

fn push_per_qps(lines: &mut Vec<String>, rows: &[AggregatedRow]) {
    lines.push("\n## Per-QPS Results\n".to_string());

    let mut rates: Vec<f64> = rows.iter().map(|r| r.requested_qps).collect();
    rates.sort_by(f64::total_cmp);
    rates.dedup();

    for qps in rates {
        let mut at_rate: Vec<&AggregatedRow> = rows.iter().filter(|r| r.requested_qps == qps).collect();
        at_rate.sort_by(|a, b| {
            cmp_missing_last(a.ttft_p90_s, b.ttft_p90_s)
                .then_with(|| cmp_missing_last(a.ttft_mean_s, b.ttft_mean_s))
                .then_with(|| cmp_descending(a.success_rate, b.success_rate))
        });

        lines.push(format!("\n### QPS = {}\n", format_qps(qps)));
        lines.push(markdown_table(at_rate.into_iter().map(ResultLine::from)));
    }
}

fn push_per_pod(lines: &mut Vec<String>, inputs: &ReportInputs<'_>, out_dir: &Path) {
    if inputs.per_pod_charts.is_empty() {
        return;
    }

    lines.push("\n## Per-Pod EPP Metrics\n".to_string());
    lines.push("Individual pod metrics over the duration of each experiment.\n".to_string());

    for (experiment, paths) in inputs.per_pod_charts {
        lines.push(format!("\n### Experiment: {}\n", experiment));

        let mut paths: Vec<&PathBuf> = paths.iter().collect();
        paths.sort();
        for path in paths {
            let pod = path
                .file_stem()
                .map(|stem| stem.to_string_lossy())
                .unwrap_or_default();
            let pod = pod.strip_prefix("epp_pod_").unwrap_or(&pod);

            lines.push(format!("**Pod:** `{}`\n", pod));
            lines.push(format!(
                "<img src=\"{}\" alt=\"Per-pod metrics for {}\" width=\"{}\"/>\n",
                relative_to(path, out_dir).display(),
                experiment,
                inputs.img_width * 2
            ));
        }
    }
}

/// Builds the full report text. Image paths are relative to `out_dir`.
pub fn render_markdown_report(inputs: &ReportInputs<'_>, out_dir: &Path) -> String {
    let mut lines = vec![format!("# {}\n", REPORT_TITLE)];

    push_configuration(&mut lines, inputs);

    if inputs.rows.is_empty() {
        lines.push("_No data found._\n".to_string());
    } else {
        push_charts(&mut lines, inputs, out_dir);
        push_reading_guide(&mut lines);
        push_summary(&mut lines, inputs);
    }

    push_per_qps(&mut lines, inputs.rows);
    push_per_pod(&mut lines, inputs, out_dir);

    lines.join("\n")
}

/// Writes `benchmark_report.md` into `out_dir` and returns its path
pub fn write_markdown_report(inputs: &ReportInputs<'_>, out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join(REPORT_FILE_NAME);
    fs::write(&path, render_markdown_report(inputs, out_dir)).map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate::derive_rates;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    fn row(experiment: &str, qps: f64, ttft_p90: Option<f64>, successes: u64) -> AggregatedRow {
        let mut row = AggregatedRow {
            experiment: experiment.to_string(),
            requested_qps: qps,
            successes,
            failures: 100 - successes,
            duration_s: Some(10.0),
            ttft_mean_s: Some(0.1),
            ttft_p90_s: ttft_p90,
            itl_mean_s: Some(0.02),
            itl_p50_s: Some(0.0123),
            itl_p90_s: Some(0.045),
            output_tokens_total: 5000,
            ..AggregatedRow::default()
        };
        derive_rates(&mut row, ServedMode::Total);
        row
    }

    fn inputs<'a>(
        rows: &'a [AggregatedRow],
        charts: &'a ChartIndex,
        per_pod: &'a PodChartIndex,
    ) -> ReportInputs<'a> {
        ReportInputs {
            rows,
            epp_summaries: &[],
            charts,
            per_pod_charts: per_pod,
            profile_yaml: None,
            epp_configs: &[],
            img_width: 720,
            served_mode: ServedMode::Total,
            baseline: None,
        }
    }

    #[test]
    fn no_data_report() {
        let temp_dir = TempDir::new().unwrap();
        let charts = ChartIndex::new();
        let per_pod = PodChartIndex::new();
        let report = render_markdown_report(&inputs(&[], &charts, &per_pod), temp_dir.path());

        assert!(report.starts_with("# Inference-Perf Benchmark Report\n"));
        assert!(report.contains("_No profile YAML found._"));
        assert!(report.contains("_No epp_config.yaml files found under experiments._"));
        assert!(report.contains("_No data found._"));
        assert!(report.contains("## Per-QPS Results"));
        assert!(!report.contains("## Charts"));
        assert!(!report.contains("### QPS ="));
        assert!(!report.contains("Per-Pod EPP Metrics"));
    }

    #[test]
    fn includes_configuration_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        create_dir_all(base.join("b")).unwrap();
        create_dir_all(base.join("a")).unwrap();
        write(base.join("profile.yaml"), "load:\n  rate: 5\n\n").unwrap();
        write(base.join("a/epp_config.yaml"), "plugins: []\n").unwrap();

        let configs = vec![
            ("b".to_string(), base.join("b/missing.yaml")),
            ("a".to_string(), base.join("a/epp_config.yaml")),
        ];
        let charts = ChartIndex::new();
        let per_pod = PodChartIndex::new();
        let profile = base.join("profile.yaml");
        let report_inputs = ReportInputs {
            profile_yaml: Some(profile.as_path()),
            epp_configs: &configs,
            ..inputs(&[], &charts, &per_pod)
        };
        let report = render_markdown_report(&report_inputs, base);

        assert!(report.contains("### Workload profile\n\n```yaml\nload:\n  rate: 5\n```\n"));
        let a = report.find("**a**").unwrap();
        let b = report.find("**b**").unwrap();
        assert!(a < b);
        assert!(report.contains("```yaml\nplugins: []\n```"));
        assert!(report.contains("```yaml\n(file unreadable)\n```"));
    }

    #[test]
    fn report_with_data() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path();
        write(out_dir.join("latency_vs_qps.png"), b"png").unwrap();
        write(out_dir.join("epp_pod_a_10_0_0_1.png"), b"png").unwrap();

        let rows = vec![
            row("a", 1.0, Some(0.3), 100),
            row("b", 1.0, Some(0.2), 95),
            row("c", 1.0, None, 100),
            row("a", 2.5, Some(0.4), 100),
        ];
        let charts: ChartIndex = vec![
            ("Latency vs QPS".to_string(), out_dir.join("latency_vs_qps.png")),
            ("Throughput vs QPS".to_string(), out_dir.join("throughput_vs_qps.png")),
        ];
        let mut per_pod = PodChartIndex::new();
        per_pod.insert("a".to_string(), vec![out_dir.join("epp_pod_a_10_0_0_1.png")]);
        let epp = vec![EppSummary {
            experiment: "a".to_string(),
            waiting_queue_size_mean: 1.26,
            waiting_queue_size_p90: 3.0,
            waiting_queue_size_max: 7.0,
            kv_cache_usage_percent_mean: 0.5,
            kv_cache_usage_percent_p90: 0.755,
            kv_cache_usage_percent_max: 0.9,
            num_pods: 2,
            num_data_points: 40,
            ..EppSummary::default()
        }];
        let report_inputs = ReportInputs {
            epp_summaries: &epp,
            ..inputs(&rows, &charts, &per_pod)
        };
        let report = render_markdown_report(&report_inputs, out_dir);

        // Only charts present on disk are embedded
        assert!(report.contains("### Latency vs QPS\n"));
        assert!(report.contains("<img src=\"latency_vs_qps.png\" alt=\"Latency vs QPS\" width=\"720\"/>"));
        assert!(!report.contains("Throughput vs QPS"));

        assert!(report.contains("### How to read this report (quick)"));
        assert!(report.contains("### Summary across QPS"));
        assert!(report.contains("Output toks/s"));
        assert!(report.contains("0.0123/0.045"));
        assert!(report.contains("95.00%"));

        assert!(report.contains("### EPP Queue and KV Cache Metrics Summary"));
        assert!(report.contains("1.3/3/7"));
        assert!(report.contains("50.0/75.5/90.0"));

        // Per-rate tables in rate order, rows by TTFT p90 with missing last
        let qps_1 = report.find("### QPS = 1.0").unwrap();
        let qps_2 = report.find("### QPS = 2.5").unwrap();
        assert!(qps_1 < qps_2);
        let section = &report[qps_1..qps_2];
        let pos = |name: &str| section.find(&format!("| {} ", name)).unwrap();
        assert!(pos("b") < pos("a"));
        assert!(pos("a") < pos("c"));

        assert!(report.contains("## Per-Pod EPP Metrics"));
        assert!(report.contains("### Experiment: a"));
        assert!(report.contains("**Pod:** `a_10_0_0_1`"));
        assert!(report.contains("alt=\"Per-pod metrics for a\" width=\"1440\""));

        assert!(!report.contains("TTFT vs baseline"));
    }

    #[test]
    fn baseline_table_when_requested() {
        let temp_dir = TempDir::new().unwrap();
        let mut faster = row("fast", 1.0, Some(0.1), 100);
        faster.ttft_mean_s = Some(0.05);
        let rows = vec![row("base", 1.0, Some(0.2), 100), faster];
        let charts = ChartIndex::new();
        let per_pod = PodChartIndex::new();
        let report_inputs = ReportInputs {
            baseline: Some("base"),
            ..inputs(&rows, &charts, &per_pod)
        };
        let report = render_markdown_report(&report_inputs, temp_dir.path());

        assert!(report.contains("### TTFT vs baseline `base`"));
        assert!(report.contains("-50.0"));
        assert!(report.contains("+0.0"));
    }

    #[test]
    fn writes_report_file() {
        let temp_dir = TempDir::new().unwrap();
        let charts = ChartIndex::new();
        let per_pod = PodChartIndex::new();
        let path = write_markdown_report(&inputs(&[], &charts, &per_pod), temp_dir.path()).unwrap();

        assert_eq!(path, temp_dir.path().join(REPORT_FILE_NAME));
        assert!(fs::read_to_string(path).unwrap().contains("_No data found._"));
    }

    #[test]
    fn formats_values() {
        assert_eq!(format_qps(1.0), "1.0");
        assert_eq!(format_qps(0.5), "0.5");
        assert_eq!(fixed(None, 3), "");
        assert_eq!(fixed(Some(1.23456), 3), "1.235");
        assert_eq!(percent(Some(0.9)), "90.00%");
        assert_eq!(percent(None), "n/a");
        assert_eq!(itl_percentiles(Some(0.01), None), "");
    }
}
