//! Rolling stage records up to one row per (experiment, requested rate)

use super::stats::{finite, mean_present, ratio, sum_present};
use crate::common::{AggregatedRow, StageRecord};
use crate::config::ServedMode;

/// Aggregates all stage records sharing an experiment and requested rate.
///
/// Records without a requested rate are left out. Counts, durations and
/// token totals are summed; reported latencies and rates are averaged over
/// the stages that have them. Rows come out ordered by experiment, then rate.
pub fn aggregate_per_qps(records: &[StageRecord], served_mode: ServedMode) -> Vec<AggregatedRow> {
    let mut keyed: Vec<(&StageRecord, f64)> = records
        .iter()
        .filter_map(|record| record.requested_qps.map(|qps| (record, qps)))
        .collect();

    keyed.sort_by(|(a, a_qps), (b, b_qps)| {
        a.experiment
            .cmp(&b.experiment)
            .then_with(|| a_qps.total_cmp(b_qps))
    });

    keyed
        .chunk_by(|(a, a_qps), (b, b_qps)| a.experiment == b.experiment && a_qps == b_qps)
        .map(|group| {
            let stages: Vec<&StageRecord> = group.iter().map(|(record, _)| *record).collect();
            aggregate_group(&stages, group[0].1, served_mode)
        })
        .collect()
}

fn aggregate_group(stages: &[&StageRecord], requested_qps: f64, served_mode: ServedMode) -> AggregatedRow {
    let mean_of = |field: fn(&StageRecord) -> Option<f64>| mean_present(stages.iter().map(|s| field(s)));

    let successes: u64 = stages.iter().map(|s| s.successes).sum();
    let failures: u64 = stages.iter().map(|s| s.failures).sum();
    let duration_s = sum_present(stages.iter().map(|s| s.send_duration_s));
    let input_tokens_total: u64 = stages.iter().map(|s| s.input_tokens_total).sum();
    let output_tokens_total: u64 = stages.iter().map(|s| s.output_tokens_total).sum();

    let mut row = AggregatedRow {
        experiment: stages[0].experiment.clone(),
        requested_qps,
        successes,
        failures,
        duration_s,
        achieved_rps_json: mean_of(|s| s.achieved_rps_json),
        ttft_mean_s: mean_of(|s| s.ttft_mean_s),
        itl_mean_s: mean_of(|s| s.itl_mean_s),
        ttft_p50_s: mean_of(|s| s.ttft_p50_s),
        ttft_p90_s: mean_of(|s| s.ttft_p90_s),
        itl_p50_s: mean_of(|s| s.itl_p50_s),
        itl_p90_s: mean_of(|s| s.itl_p90_s),
        input_tokens_total,
        output_tokens_total,
        input_toks_per_sec_json: mean_of(|s| s.input_toks_per_sec_json),
        output_toks_per_sec_json: mean_of(|s| s.output_toks_per_sec_json),
        total_toks_per_sec_json: mean_of(|s| s.total_toks_per_sec_json),
        ..AggregatedRow::default()
    };

    derive_rates(&mut row, served_mode);
    row
}

/// Fills in every field computed from the summed and averaged columns
pub fn derive_rates(row: &mut AggregatedRow, served_mode: ServedMode) {
    row.total_completed = row.successes + row.failures;
    row.success_rate = ratio(Some(row.successes as f64), Some(row.total_completed as f64));

    row.completed_rps_total = ratio(Some(row.total_completed as f64), row.duration_s);
    row.completed_rps_successes = ratio(Some(row.successes as f64), row.duration_s);
    row.completed_rps = match served_mode {
        ServedMode::Total => row.completed_rps_total,
        ServedMode::Successes => row.completed_rps_successes,
        ServedMode::Json => row.achieved_rps_json,
    };

    row.output_toks_per_sec = ratio(Some(row.output_tokens_total as f64), row.duration_s);
    row.input_toks_per_sec = ratio(Some(row.input_tokens_total as f64), row.duration_s);
    row.total_toks_per_sec = match (row.input_toks_per_sec, row.output_toks_per_sec) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };

    let prefer_reported = |reported: Option<f64>, derived: Option<f64>| reported.and_then(finite).or(derived);
    row.input_toks_per_sec_plot = prefer_reported(row.input_toks_per_sec_json, row.input_toks_per_sec);
    row.output_toks_per_sec_plot = prefer_reported(row.output_toks_per_sec_json, row.output_toks_per_sec);
    row.total_toks_per_sec_plot = prefer_reported(row.total_toks_per_sec_json, row.total_toks_per_sec);

    row.norm_time_per_output_token_s = if row.output_tokens_total > 0 {
        ratio(row.duration_s, Some(row.output_tokens_total as f64))
    } else {
        None
    };
}

/// Drops stage 0 records (usually a warm-up stage)
pub fn without_stage_zero(records: Vec<StageRecord>) -> Vec<StageRecord> {
    records
        .into_iter()
        .filter(|record| record.stage_index != Some(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(experiment: &str, qps: Option<f64>, stage_index: u32) -> StageRecord {
        StageRecord {
            experiment: experiment.to_string(),
            stage_index: Some(stage_index),
            requested_qps: qps,
            send_duration_s: Some(50.0),
            successes: 90,
            failures: 10,
            ttft_mean_s: Some(0.1),
            itl_mean_s: Some(0.01),
            input_tokens_total: 10_000,
            output_tokens_total: 5_000,
            ..StageRecord::default()
        }
    }

    #[test]
    fn groups_by_experiment_and_rate() {
        let records = vec![
            stage("b", Some(1.0), 0),
            stage("a", Some(2.0), 1),
            stage("a", Some(1.0), 0),
            stage("a", Some(2.0), 2),
            stage("a", None, 3),
        ];
        let rows = aggregate_per_qps(&records, ServedMode::Total);

        let keys: Vec<_> = rows.iter().map(|r| (r.experiment.as_str(), r.requested_qps)).collect();
        assert_eq!(keys, vec![("a", 1.0), ("a", 2.0), ("b", 1.0)]);

        let merged = &rows[1];
        assert_eq!(merged.successes, 180);
        assert_eq!(merged.failures, 20);
        assert_eq!(merged.duration_s, Some(100.0));
        assert_eq!(merged.output_tokens_total, 10_000);
    }

    #[test]
    fn derives_rates() {
        let mut first = stage("a", Some(2.0), 0);
        first.ttft_mean_s = Some(0.1);
        first.output_toks_per_sec_json = Some(f64::INFINITY);
        let mut second = stage("a", Some(2.0), 1);
        second.ttft_mean_s = None;
        second.achieved_rps_json = Some(1.7);

        let rows = aggregate_per_qps(&[first, second], ServedMode::Total);
        let row = &rows[0];

        assert_eq!(row.total_completed, 200);
        assert_eq!(row.success_rate, Some(0.9));
        assert_eq!(row.completed_rps_total, Some(2.0));
        assert_eq!(row.completed_rps_successes, Some(1.8));
        assert_eq!(row.completed_rps, Some(2.0));
        assert_eq!(row.ttft_mean_s, Some(0.1));
        assert_eq!(row.output_toks_per_sec, Some(100.0));
        assert_eq!(row.input_toks_per_sec, Some(200.0));
        assert_eq!(row.total_toks_per_sec, Some(300.0));
        // Infinite reported throughput falls back to the derived value
        assert_eq!(row.output_toks_per_sec_plot, Some(100.0));
        assert_eq!(row.norm_time_per_output_token_s, Some(0.01));
    }

    #[test]
    fn served_mode_selects_completed_rps() {
        let mut record = stage("a", Some(2.0), 0);
        record.achieved_rps_json = Some(1.25);
        let records = [record];

        let successes = aggregate_per_qps(&records, ServedMode::Successes);
        assert_eq!(successes[0].completed_rps, Some(1.8));

        let json = aggregate_per_qps(&records, ServedMode::Json);
        assert_eq!(json[0].completed_rps, Some(1.25));
    }

    #[test]
    fn reported_throughput_wins_when_present() {
        let mut record = stage("a", Some(2.0), 0);
        record.output_toks_per_sec_json = Some(123.0);
        let rows = aggregate_per_qps(&[record], ServedMode::Total);

        assert_eq!(rows[0].output_toks_per_sec_plot, Some(123.0));
        assert_eq!(rows[0].input_toks_per_sec_plot, Some(200.0));
    }

    #[test]
    fn zero_denominators_are_absent() {
        let mut record = stage("a", Some(2.0), 0);
        record.send_duration_s = None;
        record.successes = 0;
        record.failures = 0;
        record.output_tokens_total = 0;
        let rows = aggregate_per_qps(&[record], ServedMode::Total);
        let row = &rows[0];

        assert_eq!(row.duration_s, None);
        assert_eq!(row.success_rate, None);
        assert_eq!(row.completed_rps, None);
        assert_eq!(row.output_toks_per_sec, None);
        assert_eq!(row.norm_time_per_output_token_s, None);
    }

    #[test]
    fn drops_stage_zero() {
        let records = vec![stage("a", Some(1.0), 0), stage("a", Some(1.0), 1)];
        let kept = without_stage_zero(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].stage_index, Some(1));
    }
}
