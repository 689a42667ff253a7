//! End-of-run console output

use crate::charts::ChartIndex;
use crate::common::SummaryRow;
use std::path::PathBuf;
use tabled::{Table, Tabled};

/// Paths of everything a run produced
#[derive(Debug, Clone, Default)]
pub struct WrittenFiles {
    pub analysis_csv: PathBuf,
    pub epp_csv: Option<PathBuf>,
    pub epp_summary_csv: Option<PathBuf>,
    pub charts: ChartIndex,
    pub per_pod_chart_count: usize,
    pub out_dir: PathBuf,
    pub report: PathBuf,
}

#[derive(Debug, Clone, Tabled)]
struct ConsoleLine {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "QPS points")]
    qps_points: usize,
    #[tabled(rename = "Successes")]
    successes: u64,
    #[tabled(rename = "Failures")]
    failures: u64,
    #[tabled(rename = "Output toks/s")]
    output_toks_per_sec: String,
    #[tabled(rename = "TTFT p90 (s)")]
    ttft_p90: String,
}

fn or_dash(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

/// Formats the per-experiment summary as an ASCII table
///
/// # Arguments
/// * `summary` - One row per experiment
/// * `title` - Optional title underlined above the table
///
/// # Returns
/// The formatted table, or a placeholder line when there are no rows
pub fn format_summary_table(summary: &[SummaryRow], title: Option<&str>) -> String {
    if summary.is_empty() {
        return "No stage data found".to_string();
    }

    let lines = summary.iter().map(|row| ConsoleLine {
        experiment: row.experiment.clone(),
        qps_points: row.qps_points,
        successes: row.successes,
        failures: row.failures,
        output_toks_per_sec: or_dash(row.output_toks_per_sec_overall, 1),
        ttft_p90: or_dash(row.ttft_p90_s_overall, 3),
    });
    let table = Table::new(lines).to_string();

    match title {
        Some(title) => format!("{}\n{}\n{}", title, "=".repeat(title.len()), table),
        None => table,
    }
}

/// Lists every file written by the run
pub fn format_written(files: &WrittenFiles) -> String {
    let mut lines = vec![
        "Wrote:".to_string(),
        format!("  CSV:       {}", files.analysis_csv.display()),
    ];
    if let Some(path) = &files.epp_csv {
        lines.push(format!("  EPP CSV:   {}", path.display()));
    }
    if let Some(path) = &files.epp_summary_csv {
        lines.push(format!("  EPP Agg:   {}", path.display()));
    }
    for (title, path) in &files.charts {
        lines.push(format!("  {}: {}", title, path.display()));
    }
    if files.per_pod_chart_count > 0 {
        lines.push(format!(
            "  Per-Pod EPP Charts: {} generated in {}",
            files.per_pod_chart_count,
            files.out_dir.display()
        ));
    }
    lines.push(format!("  Report MD: {}", files.report.display()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary_table() {
        let summary = vec![SummaryRow {
            experiment: "exp-a".to_string(),
            qps_points: 3,
            successes: 120,
            failures: 4,
            output_toks_per_sec_overall: Some(1234.56),
            ..SummaryRow::default()
        }];
        let table = format_summary_table(&summary, Some("Summary"));

        assert!(table.starts_with("Summary\n=======\n"));
        assert!(table.contains("exp-a"));
        assert!(table.contains("1234.6"));
        assert!(table.contains(" - "));

        assert_eq!(format_summary_table(&[], None), "No stage data found");
    }

    #[test]
    fn test_format_written() {
        let files = WrittenFiles {
            analysis_csv: PathBuf::from("out/analysis_metrics.csv"),
            epp_csv: None,
            epp_summary_csv: Some(PathBuf::from("out/epp_log_metrics_summary.csv")),
            charts: vec![("Latency vs QPS".to_string(), PathBuf::from("out/latency_vs_qps.png"))],
            per_pod_chart_count: 2,
            out_dir: PathBuf::from("out"),
            report: PathBuf::from("out/benchmark_report.md"),
        };
        let text = format_written(&files);

        assert!(text.starts_with("Wrote:\n"));
        assert!(!text.contains("EPP CSV:"));
        assert!(text.contains("EPP Agg:   out/epp_log_metrics_summary.csv"));
        assert!(text.contains("  Latency vs QPS: out/latency_vs_qps.png"));
        assert!(text.contains("Per-Pod EPP Charts: 2 generated in out"));
        assert!(text.ends_with("Report MD: out/benchmark_report.md"));
    }
}
