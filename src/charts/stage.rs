//! Comparison charts built from per-rate aggregated rows

use crate::analysis::stats::mean_present;
use crate::common::plots::{Figure, LinePanel, Panel, Series, SINGLE_SIZE, TRIPLE_SIZE};
use crate::common::AggregatedRow;
use crate::parsing::stage::cmp_missing_last;
use std::collections::BTreeMap;

/// Experiments whose mean success rate is below this are left off the
/// multi-panel charts
pub const MIN_SUCCESS_RATE: f64 = 0.9;

const QPS_LABEL: &str = "QPS (requested rate)";
const TO_MS: f64 = 1000.0;

type Field = fn(&AggregatedRow) -> Option<f64>;

/// Rows of one experiment, ordered by requested rate
struct Experiment<'a> {
    name: &'a str,
    rows: Vec<&'a AggregatedRow>,
}

/// Groups rows by experiment, ordered by the mean of `rank_by` ascending.
/// Experiments without any value for `rank_by` go last.
fn experiments_ranked_by(rows: &[AggregatedRow], rank_by: Field) -> Vec<Experiment<'_>> {
    let mut grouped: BTreeMap<&str, Vec<&AggregatedRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(&row.experiment).or_default().push(row);
    }

    let mut experiments: Vec<(Option<f64>, Experiment<'_>)> = grouped
        .into_iter()
        .map(|(name, mut rows)| {
            rows.sort_by(|a, b| a.requested_qps.total_cmp(&b.requested_qps));
            let rank = mean_present(rows.iter().map(|r| rank_by(r)));
            (rank, Experiment { name, rows })
        })
        .collect();

    experiments.sort_by(|(a, _), (b, _)| cmp_missing_last(*a, *b));
    experiments.into_iter().map(|(_, experiment)| experiment).collect()
}

/// Experiments with no success rate at all are kept
fn meets_success_rate(experiment: &Experiment<'_>) -> bool {
    mean_present(experiment.rows.iter().map(|r| r.success_rate))
        .map_or(true, |rate| rate >= MIN_SUCCESS_RATE)
}

/// `(x * x_scale, y * y_scale)` for every row that has both values
fn points(rows: &[&AggregatedRow], x: Field, y: Field, (x_scale, y_scale): (f64, f64)) -> Vec<(f64, f64)> {
    rows.iter()
        .filter_map(|row| Some((x(row)? * x_scale, y(row)? * y_scale)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect()
}

fn requested_qps(row: &AggregatedRow) -> Option<f64> {
    Some(row.requested_qps)
}

/// Definition of one panel of a multi-panel chart
struct PanelSpec {
    title: &'static str,
    x_label: &'static str,
    y_label: &'static str,
    x: Field,
    y: Field,
    x_scale: f64,
    y_scale: f64,
}

/// Builds a 1x3 chart with one series per qualifying experiment in each
/// panel. Only the first panel carries the legend; colours match across
/// panels.
fn triple_chart(
    rows: &[AggregatedRow],
    title: &str,
    specs: [PanelSpec; 3],
    keep_row: impl Fn(&AggregatedRow) -> bool,
) -> Figure {
    let mut panels: Vec<LinePanel> = specs
        .iter()
        .map(|spec| LinePanel {
            title: spec.title.to_string(),
            x_label: spec.x_label.to_string(),
            y_label: spec.y_label.to_string(),
            series: Vec::new(),
            y_range: None,
        })
        .collect();

    let experiments = experiments_ranked_by(rows, |r| r.ttft_mean_s);
    let mut color = 0;
    for experiment in experiments.iter().filter(|e| meets_success_rate(e)) {
        let kept: Vec<&AggregatedRow> = experiment.rows.iter().copied().filter(|r| keep_row(r)).collect();
        if kept.is_empty() {
            continue;
        }

        for (index, (panel, spec)) in panels.iter_mut().zip(&specs).enumerate() {
            let points = points(&kept, spec.x, spec.y, (spec.x_scale, spec.y_scale));
            let label = (index == 0).then(|| experiment.name.to_string());
            panel.series.push(Series::new(label, color, points));
        }
        color += 1;
    }

    Figure {
        title: Some(title.to_string()),
        size: TRIPLE_SIZE,
        layout: (1, 3),
        panels: panels.into_iter().map(Panel::Line).collect(),
    }
}

/// TTFT, normalised time per output token and ITL against requested rate
pub fn latency_vs_qps(rows: &[AggregatedRow]) -> Figure {
    triple_chart(
        rows,
        "Latency vs Request Rate",
        [
            PanelSpec {
                title: "Time to First Token vs. QPS",
                x_label: QPS_LABEL,
                y_label: "Mean TTFT (ms)",
                x: requested_qps,
                y: |r| r.ttft_mean_s,
                x_scale: 1.0,
                y_scale: TO_MS,
            },
            PanelSpec {
                title: "Norm. Time per Output Token vs. QPS",
                x_label: QPS_LABEL,
                y_label: "Mean Norm. Time (ms/token)",
                x: requested_qps,
                y: |r| r.norm_time_per_output_token_s,
                x_scale: 1.0,
                y_scale: TO_MS,
            },
            PanelSpec {
                title: "Inter-Token Latency vs. QPS",
                x_label: QPS_LABEL,
                y_label: "Mean ITL (ms)",
                x: requested_qps,
                y: |r| r.itl_mean_s,
                x_scale: 1.0,
                y_scale: TO_MS,
            },
        ],
        |_| true,
    )
}

/// Input, output and total tokens/sec against requested rate
pub fn throughput_vs_qps(rows: &[AggregatedRow]) -> Figure {
    triple_chart(
        rows,
        "Throughput vs Request Rate",
        [
            PanelSpec {
                title: "Input Tokens/sec vs. QPS",
                x_label: QPS_LABEL,
                y_label: "Tokens/sec",
                x: requested_qps,
                y: |r| r.input_toks_per_sec_plot,
                x_scale: 1.0,
                y_scale: 1.0,
            },
            PanelSpec {
                title: "Output Tokens/sec vs. QPS",
                x_label: QPS_LABEL,
                y_label: "Tokens/sec",
                x: requested_qps,
                y: |r| r.output_toks_per_sec_plot,
                x_scale: 1.0,
                y_scale: 1.0,
            },
            PanelSpec {
                title: "Total Tokens/sec vs. QPS",
                x_label: QPS_LABEL,
                y_label: "Tokens/sec",
                x: requested_qps,
                y: |r| r.total_toks_per_sec_plot,
                x_scale: 1.0,
                y_scale: 1.0,
            },
        ],
        |r| {
            r.input_toks_per_sec_plot.is_some()
                || r.output_toks_per_sec_plot.is_some()
                || r.total_toks_per_sec_plot.is_some()
        },
    )
}

/// Output tokens/sec against each latency measure
pub fn throughput_vs_latency(rows: &[AggregatedRow]) -> Figure {
    let throughput: Field = |r| r.output_toks_per_sec_plot;
    triple_chart(
        rows,
        "Latency vs Throughput",
        [
            PanelSpec {
                title: "Throughput vs. Norm. Time per Output Token",
                x_label: "Mean Norm. Time (ms/token)",
                y_label: "Output Tokens/sec",
                x: |r| r.norm_time_per_output_token_s,
                y: throughput,
                x_scale: TO_MS,
                y_scale: 1.0,
            },
            PanelSpec {
                title: "Throughput vs. Time to First Token (sorted by TTFT)",
                x_label: "Mean TTFT (ms)",
                y_label: "Output Tokens/sec",
                x: |r| r.ttft_mean_s,
                y: throughput,
                x_scale: TO_MS,
                y_scale: 1.0,
            },
            PanelSpec {
                title: "Throughput vs. Inter-Token Latency",
                x_label: "Mean ITL (ms)",
                y_label: "Output Tokens/sec",
                x: |r| r.itl_mean_s,
                y: throughput,
                x_scale: TO_MS,
                y_scale: 1.0,
            },
        ],
        |r| r.output_toks_per_sec_plot.is_some(),
    )
}

/// TTFT p90 against requested rate, every experiment included
pub fn ttft_p90_vs_qps(rows: &[AggregatedRow]) -> Figure {
    let series = experiments_ranked_by(rows, |r| r.ttft_p90_s)
        .into_iter()
        .filter_map(|experiment| {
            let points = points(&experiment.rows, requested_qps, |r| r.ttft_p90_s, (1.0, TO_MS));
            (!points.is_empty()).then(|| (experiment.name, points))
        })
        .enumerate()
        .map(|(color, (name, points))| Series::new(Some(name.to_string()), color, points))
        .collect();

    Figure {
        title: None,
        size: SINGLE_SIZE,
        layout: (1, 1),
        panels: vec![Panel::Line(LinePanel {
            title: "TTFT p90 vs QPS".to_string(),
            x_label: QPS_LABEL.to_string(),
            y_label: "TTFT p90 (ms)".to_string(),
            series,
            y_range: None,
        })],
    }
}
