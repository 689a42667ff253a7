//! Scheduler (EPP) charts built from per-pod samples
//!
//! Time axes are minutes since each experiment's first sample, so experiments
//! run at different wall-clock times line up.

use crate::common::plots::{
    BoxPanel, BoxStats, Figure, LinePanel, Panel, Series, GRID_SIZE, WIDE_SIZE,
};
use crate::common::PodSample;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

const MINUTES_LABEL: &str = "Minutes from experiment start";
const TO_PERCENT: f64 = 100.0;

/// Samples of one experiment, split per pod
struct Experiment<'a> {
    name: &'a str,
    start: DateTime<Utc>,
    /// Ordered by pod address; each pod's samples are in time order
    pods: Vec<(&'a str, Vec<&'a PodSample>)>,
}

impl Experiment<'_> {
    fn minutes(&self, sample: &PodSample) -> f64 {
        (sample.timestamp - self.start).num_milliseconds() as f64 / 60_000.0
    }

    fn samples(&self) -> impl Iterator<Item = &PodSample> + '_ {
        self.pods.iter().flat_map(|(_, samples)| samples.iter().copied())
    }
}

fn group_by_experiment(samples: &[PodSample]) -> Vec<Experiment<'_>> {
    let mut grouped: BTreeMap<&str, BTreeMap<&str, Vec<&PodSample>>> = BTreeMap::new();
    for sample in samples {
        grouped
            .entry(&sample.experiment)
            .or_default()
            .entry(&sample.pod_address)
            .or_default()
            .push(sample);
    }

    grouped
        .into_iter()
        .filter_map(|(name, pods)| {
            let mut pods: Vec<(&str, Vec<&PodSample>)> = pods.into_iter().collect();
            for (_, samples) in &mut pods {
                samples.sort_by_key(|s| s.timestamp);
            }
            let start = pods
                .iter()
                .flat_map(|(_, samples)| samples.iter().map(|s| s.timestamp))
                .min()?;
            Some(Experiment { name, start, pods })
        })
        .collect()
}

/// Last three characters of an address, enough to tell pods apart
fn address_suffix(address: &str) -> &str {
    let start = address
        .char_indices()
        .rev()
        .nth(2)
        .map_or(0, |(index, _)| index);
    &address[start..]
}

/// One line per pod, one colour per experiment. Only each experiment's
/// first pod gets a legend entry.
fn per_pod_series(experiments: &[Experiment<'_>], value: fn(&PodSample) -> f64) -> Vec<Series> {
    let mut series = Vec::new();
    for (color, experiment) in experiments.iter().enumerate() {
        let multi_pod = experiment.pods.len() > 1;
        for (index, (address, samples)) in experiment.pods.iter().enumerate() {
            let label = (index == 0).then(|| {
                if multi_pod {
                    format!("{}-{}", experiment.name, address_suffix(address))
                } else {
                    experiment.name.to_string()
                }
            });
            let points = samples
                .iter()
                .map(|s| (experiment.minutes(s), value(s)))
                .collect();

            series.push(Series {
                label,
                color,
                points,
                markers: false,
                opacity: if multi_pod { 0.7 } else { 1.0 },
            });
        }
    }
    series
}

/// Waiting queue size of every pod over time
pub fn waiting_queue_vs_time(samples: &[PodSample]) -> Figure {
    let experiments = group_by_experiment(samples);
    Figure {
        title: Some("Waiting Queue Size Over Time (Experiment-Normalized)".to_string()),
        size: WIDE_SIZE,
        layout: (1, 1),
        panels: vec![Panel::Line(LinePanel {
            title: "Waiting Queue Size Over Time (Normalized)".to_string(),
            x_label: MINUTES_LABEL.to_string(),
            y_label: "Waiting Queue Size".to_string(),
            series: per_pod_series(&experiments, |s| s.waiting_queue_size),
            y_range: None,
        })],
    }
}

/// KV cache usage of every pod over time, in percent
pub fn kv_cache_usage_vs_time(samples: &[PodSample]) -> Figure {
    let experiments = group_by_experiment(samples);
    Figure {
        title: None,
        size: WIDE_SIZE,
        layout: (1, 1),
        panels: vec![Panel::Line(LinePanel {
            title: "KV Cache Usage Over Time (Normalized)".to_string(),
            x_label: MINUTES_LABEL.to_string(),
            y_label: "KV Cache Usage (%)".to_string(),
            series: per_pod_series(&experiments, |s| s.kv_cache_usage_percent * TO_PERCENT),
            y_range: None,
        })],
    }
}

/// Folds all pods of an experiment into one value per timestamp
fn across_pods(
    experiment: &Experiment<'_>,
    fold: fn(&[f64]) -> f64,
    value: fn(&PodSample) -> f64,
) -> Vec<(f64, f64)> {
    let mut by_time: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
    for sample in experiment.samples() {
        by_time.entry(sample.timestamp).or_default().push(value(sample));
    }

    by_time
        .into_iter()
        .map(|(timestamp, values)| {
            let minutes = (timestamp - experiment.start).num_milliseconds() as f64 / 60_000.0;
            (minutes, fold(&values))
        })
        .collect()
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

fn average(values: &[f64]) -> f64 {
    sum(values) / values.len().max(1) as f64
}

/// 2x2 overview: total queue and average KV usage over time, plus the
/// distribution of each per experiment
pub fn epp_metrics_comparison(samples: &[PodSample]) -> Figure {
    let experiments = group_by_experiment(samples);

    let queue_over_time = experiments
        .iter()
        .enumerate()
        .map(|(color, experiment)| {
            let points = across_pods(experiment, sum, |s| s.waiting_queue_size);
            Series {
                markers: false,
                ..Series::new(Some(experiment.name.to_string()), color, points)
            }
        })
        .collect();

    let kv_over_time = experiments
        .iter()
        .enumerate()
        .map(|(color, experiment)| {
            let points = across_pods(experiment, average, |s| s.kv_cache_usage_percent * TO_PERCENT);
            Series {
                markers: false,
                ..Series::new(None, color, points)
            }
        })
        .collect();

    let distribution = |value: fn(&PodSample) -> f64| -> Vec<BoxStats> {
        experiments
            .iter()
            .filter_map(|experiment| {
                let values: Vec<f64> = experiment.samples().map(value).collect();
                BoxStats::from_values(experiment.name, &values)
            })
            .collect()
    };

    Figure {
        title: Some("EPP Metrics Comparative Analysis".to_string()),
        size: GRID_SIZE,
        layout: (2, 2),
        panels: vec![
            Panel::Line(LinePanel {
                title: "Waiting Queue Size Over Time".to_string(),
                x_label: MINUTES_LABEL.to_string(),
                y_label: "Waiting Queue Size".to_string(),
                series: queue_over_time,
                y_range: None,
            }),
            Panel::Line(LinePanel {
                title: "Average KV Cache Usage Over Time".to_string(),
                x_label: MINUTES_LABEL.to_string(),
                y_label: "Average KV Cache Usage (%)".to_string(),
                series: kv_over_time,
                y_range: None,
            }),
            Panel::Box(BoxPanel {
                title: "Queue Size Distribution".to_string(),
                y_label: "Waiting Queue Size".to_string(),
                boxes: distribution(|s| s.waiting_queue_size),
            }),
            Panel::Box(BoxPanel {
                title: "KV Cache Usage Distribution".to_string(),
                y_label: "KV Cache Usage (%)".to_string(),
                boxes: distribution(|s| s.kv_cache_usage_percent * TO_PERCENT),
            }),
        ],
    }
}

/// A chart for a single pod of a single experiment
#[derive(Debug, Clone, PartialEq)]
pub struct PodChart {
    pub experiment: String,
    pub pod_address: String,
    /// `epp_pod_<experiment>_<sanitised address>.png`
    pub file_name: String,
    pub figure: Figure,
}

/// Replaces everything but ASCII letters, digits, `_` and `-` with `_`
pub fn sanitize_file_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Queue size and KV usage side by side, one chart per (experiment, pod)
pub fn per_pod_charts(samples: &[PodSample]) -> Vec<PodChart> {
    let mut charts = Vec::new();
    for experiment in group_by_experiment(samples) {
        for (address, pod_samples) in &experiment.pods {
            let series = |value: fn(&PodSample) -> f64| {
                let points = pod_samples
                    .iter()
                    .map(|s| (experiment.minutes(s), value(s)))
                    .collect();
                vec![Series::new(None, 0, points)]
            };

            let figure = Figure {
                title: Some(format!("EPP Metrics for {} / Pod {}", experiment.name, address)),
                size: WIDE_SIZE,
                layout: (1, 2),
                panels: vec![
                    Panel::Line(LinePanel {
                        title: "Waiting Queue Size".to_string(),
                        x_label: "Minutes from start".to_string(),
                        y_label: "Waiting Queue Size".to_string(),
                        series: series(|s| s.waiting_queue_size),
                        y_range: None,
                    }),
                    Panel::Line(LinePanel {
                        title: "KV Cache Usage".to_string(),
                        x_label: "Minutes from start".to_string(),
                        y_label: "KV Cache Usage (%)".to_string(),
                        series: series(|s| s.kv_cache_usage_percent * TO_PERCENT),
                        y_range: Some(0.0..100.0),
                    }),
                ],
            };

            charts.push(PodChart {
                experiment: experiment.name.to_string(),
                pod_address: address.to_string(),
                file_name: format!(
                    "epp_pod_{}_{}.png",
                    experiment.name,
                    sanitize_file_component(address)
                ),
                figure,
            });
        }
    }
    charts
}
