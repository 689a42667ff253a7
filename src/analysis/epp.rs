//! Per-experiment statistics over EPP pod samples

use super::stats::{mean, percentile};
use crate::common::{AggregatedRow, EppSummary, PodSample};
use std::collections::{BTreeMap, HashSet};

/// Summarises queue depth and KV cache usage across every pod and time
/// point of each experiment. Output is ordered by experiment.
pub fn aggregate_epp_by_experiment(samples: &[PodSample]) -> Vec<EppSummary> {
    let mut by_experiment: BTreeMap<&str, Vec<&PodSample>> = BTreeMap::new();
    for sample in samples {
        by_experiment.entry(&sample.experiment).or_default().push(sample);
    }

    by_experiment
        .into_iter()
        .map(|(experiment, samples)| summarise(experiment, &samples))
        .collect()
}

fn summarise(experiment: &str, samples: &[&PodSample]) -> EppSummary {
    let queue: Vec<f64> = samples.iter().map(|s| s.waiting_queue_size).collect();
    let kv_cache: Vec<f64> = samples.iter().map(|s| s.kv_cache_usage_percent).collect();
    let pods: HashSet<&str> = samples.iter().map(|s| s.pod_address.as_str()).collect();

    let first = samples.iter().map(|s| s.timestamp).min();
    let last = samples.iter().map(|s| s.timestamp).max();
    let time_span_minutes = match (first, last) {
        (Some(first), Some(last)) => (last - first).num_milliseconds() as f64 / 60_000.0,
        _ => 0.0,
    };

    EppSummary {
        experiment: experiment.to_string(),
        waiting_queue_size_mean: mean(&queue).unwrap_or(0.0),
        waiting_queue_size_p50: percentile(&queue, 50.0).unwrap_or(0.0),
        waiting_queue_size_p90: percentile(&queue, 90.0).unwrap_or(0.0),
        waiting_queue_size_max: max(&queue),
        kv_cache_usage_percent_mean: mean(&kv_cache).unwrap_or(0.0),
        kv_cache_usage_percent_p50: percentile(&kv_cache, 50.0).unwrap_or(0.0),
        kv_cache_usage_percent_p90: percentile(&kv_cache, 90.0).unwrap_or(0.0),
        kv_cache_usage_percent_max: max(&kv_cache),
        num_pods: pods.len(),
        num_data_points: samples.len(),
        time_span_minutes,
    }
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Attaches each experiment's EPP summary to its aggregated rows
pub fn merge_epp_metrics(rows: &mut [AggregatedRow], summaries: &[EppSummary]) {
    for row in rows {
        row.epp = summaries
            .iter()
            .find(|summary| summary.experiment == row.experiment)
            .cloned();
    }
}
