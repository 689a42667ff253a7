//! One row per experiment across every requested rate

use super::stats::{mean_present, ratio, sum_present, weighted_mean};
use crate::common::{AggregatedRow, SummaryRow};
use crate::config::ServedMode;
use crate::parsing::stage::cmp_missing_last;
use std::collections::BTreeMap;

/// Collapses the per-rate rows of each experiment into overall statistics.
///
/// Latency columns are weighted by the number of successful requests at each
/// rate. When `baseline` names an experiment with a non-zero overall TTFT
/// mean, every row gets its relative TTFT change against it.
///
/// Rows are ordered by overall TTFT p90, then overall TTFT mean, ascending;
/// experiments missing those values go last.
pub fn build_summary_across_qps(
    rows: &[AggregatedRow],
    served_mode: ServedMode,
    baseline: Option<&str>,
) -> Vec<SummaryRow> {
    let mut by_experiment: BTreeMap<&str, Vec<&AggregatedRow>> = BTreeMap::new();
    for row in rows {
        by_experiment.entry(&row.experiment).or_default().push(row);
    }

    let mut summary: Vec<SummaryRow> = by_experiment
        .into_iter()
        .map(|(experiment, rows)| summarise(experiment, &rows, served_mode))
        .collect();

    apply_baseline(&mut summary, baseline);

    summary.sort_by(|a, b| {
        cmp_missing_last(a.ttft_p90_s_overall, b.ttft_p90_s_overall)
            .then_with(|| cmp_missing_last(a.ttft_mean_s_overall, b.ttft_mean_s_overall))
    });
    summary
}

fn summarise(experiment: &str, rows: &[&AggregatedRow], served_mode: ServedMode) -> SummaryRow {
    let successes: u64 = rows.iter().map(|r| r.successes).sum();
    let failures: u64 = rows.iter().map(|r| r.failures).sum();
    let total_completed = (successes + failures) as f64;
    let duration_s = sum_present(rows.iter().map(|r| r.duration_s));

    let completed_rps_overall = match served_mode {
        ServedMode::Json => {
            let served = sum_present(
                rows.iter()
                    .map(|r| r.achieved_rps_json.zip(r.duration_s).map(|(rps, d)| rps * d)),
            );
            ratio(served, duration_s)
        }
        ServedMode::Successes => ratio(Some(successes as f64), duration_s),
        ServedMode::Total => ratio(Some(total_completed), duration_s),
    };

    let output_tokens_total: u64 = rows.iter().map(|r| r.output_tokens_total).sum();
    let input_tokens_total: u64 = rows.iter().map(|r| r.input_tokens_total).sum();

    // Reported per-rate means win over token totals / duration
    let output_toks_per_sec_overall = mean_present(rows.iter().map(|r| r.output_toks_per_sec_json))
        .or_else(|| ratio(Some(output_tokens_total as f64), duration_s));
    let input_toks_per_sec_overall = mean_present(rows.iter().map(|r| r.input_toks_per_sec_json))
        .or_else(|| ratio(Some(input_tokens_total as f64), duration_s));

    let by_successes = |field: fn(&AggregatedRow) -> Option<f64>| {
        weighted_mean(rows.iter().map(|r| (field(r), r.successes as f64)))
    };

    let mut distinct_rates: Vec<f64> = rows.iter().map(|r| r.requested_qps).collect();
    distinct_rates.sort_by(f64::total_cmp);
    distinct_rates.dedup();

    SummaryRow {
        experiment: experiment.to_string(),
        qps_points: distinct_rates.len(),
        successes,
        failures,
        duration_s,
        completed_rps_overall,
        output_tokens_total,
        input_tokens_total,
        output_toks_per_sec_overall,
        input_toks_per_sec_overall,
        ttft_mean_s_overall: by_successes(|r| r.ttft_mean_s),
        itl_mean_s_overall: by_successes(|r| r.itl_mean_s),
        ttft_p50_s_overall: by_successes(|r| r.ttft_p50_s),
        ttft_p90_s_overall: by_successes(|r| r.ttft_p90_s),
        itl_p50_s_overall: by_successes(|r| r.itl_p50_s),
        itl_p90_s_overall: by_successes(|r| r.itl_p90_s),
        success_rate_overall: ratio(Some(successes as f64), Some(total_completed)),
        epp: rows.iter().find_map(|r| r.epp.clone()),
        ttft_delta_vs_baseline_pct: None,
    }
}

fn apply_baseline(summary: &mut [SummaryRow], baseline: Option<&str>) {
    let Some(baseline) = baseline else {
        return;
    };

    let base_ttft = summary
        .iter()
        .find(|row| row.experiment == baseline)
        .and_then(|row| row.ttft_mean_s_overall)
        .filter(|ttft| *ttft != 0.0);

    if let Some(base_ttft) = base_ttft {
        for row in summary {
            row.ttft_delta_vs_baseline_pct = row
                .ttft_mean_s_overall
                .map(|ttft| (ttft - base_ttft) / base_ttft * 100.0);
        }
    }
}
