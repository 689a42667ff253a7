//! Extracting per-pod queue depth and KV cache usage from `epp.log`
//!
//! Relevant lines start with a `YYYY-MM-DDTHH:MM:SSZ` timestamp and carry a
//! `"pods": [...]` array somewhere in their payload:
//!
//! ```text
//! 2025-01-01T10:00:00Z DEBUG ... {"pods": [{"NamespacedName": {"Name": "vllm-0"},
//!     "Address": "10.0.0.1", "WaitingQueueSize": 3, "KVCacheUsagePercent": 0.42,
//!     "UpdateTime": "2025-01-01T09:59:59.5Z"}]}
//! ```
//!
//! Everything else is ignored.

use super::discovery::{experiment_label, find_epp_log_files};
use super::json::as_f64;
use super::{ParsingError, Result};
use crate::common::PodSample;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Length of `YYYY-MM-DDTHH:MM:SSZ`
const TIMESTAMP_LEN: usize = 20;
const PODS_KEY: &str = "\"pods\":";

/// Parses the leading `YYYY-MM-DDTHH:MM:SSZ` timestamp of a log line
fn parse_line_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let candidate = line.get(..TIMESTAMP_LEN)?;
    let naive = NaiveDateTime::parse_from_str(candidate, "%Y-%m-%dT%H:%M:%SZ").ok()?;
    Some(naive.and_utc())
}

/// Extracts one sample per pod from a single log line.
///
/// The returned samples have an empty `experiment` and `epp_log_path`;
/// [`parse_epp_log_file`] fills those in. Returns [`None`] when the line
/// carries no usable pod data.
pub fn parse_epp_log_line(line: &str) -> Option<Vec<PodSample>> {
    let timestamp = parse_line_timestamp(line)?;

    let pods_start = line.find(PODS_KEY)?;
    let bracket_start = pods_start + line[pods_start..].find('[')?;

    // Deserialize only the first value; whatever follows the array is ignored.
    let pods = serde_json::Deserializer::from_str(&line[bracket_start..])
        .into_iter::<Value>()
        .next()?
        .ok()?;

    let samples: Vec<PodSample> = pods
        .as_array()?
        .iter()
        .filter_map(|pod| pod_sample(pod, timestamp))
        .collect();

    (!samples.is_empty()).then_some(samples)
}

fn pod_sample(pod: &Value, timestamp: DateTime<Utc>) -> Option<PodSample> {
    let pod = pod.as_object()?;

    let pod_name = pod
        .get("NamespacedName")
        .and_then(|ns| ns.get("Name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let pod_address = pod
        .get("Address")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let pod_update_time = pod
        .get("UpdateTime")
        .and_then(Value::as_str)
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(timestamp);

    Some(PodSample {
        experiment: String::new(),
        timestamp,
        pod_update_time,
        pod_name,
        pod_address,
        waiting_queue_size: pod.get("WaitingQueueSize").and_then(as_f64).unwrap_or(0.0),
        kv_cache_usage_percent: pod
            .get("KVCacheUsagePercent")
            .and_then(as_f64)
            .unwrap_or(0.0),
        epp_log_path: PathBuf::new(),
    })
}

/// Parses every line of an `epp.log`, keeping pods whose address is in
/// `target_addresses` (all pods when [`None`]).
pub fn parse_epp_log_file(
    base_dir: &Path,
    epp_log_path: &Path,
    target_addresses: Option<&HashSet<String>>,
) -> Result<Vec<PodSample>> {
    let bytes = fs::read(epp_log_path).map_err(|e| ParsingError::FileRead {
        path: epp_log_path.to_path_buf(),
        source: e,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let experiment = experiment_label(base_dir, epp_log_path);

    let mut samples: Vec<PodSample> = text
        .lines()
        .filter_map(|line| parse_epp_log_line(line.trim()))
        .flatten()
        .filter(|sample| target_addresses.map_or(true, |t| t.contains(&sample.pod_address)))
        .map(|mut sample| {
            sample.experiment = experiment.clone();
            sample.epp_log_path = epp_log_path.to_path_buf();
            sample
        })
        .collect();

    debug!(path = %epp_log_path.display(), samples = samples.len(), "parsed epp log");
    sort_samples(&mut samples);
    Ok(samples)
}

/// Collects samples from every `epp.log` below `base_dir`.
///
/// Unreadable logs are skipped with a warning. The result is ordered by
/// experiment, pod address and timestamp.
pub fn build_epp_samples(
    base_dir: &Path,
    target_addresses: Option<&HashSet<String>>,
) -> Result<Vec<PodSample>> {
    let files = find_epp_log_files(base_dir).map_err(|e| ParsingError::FileRead {
        path: base_dir.to_path_buf(),
        source: e,
    })?;
    info!(count = files.len(), "found epp logs");

    let mut samples = Vec::new();
    for path in &files {
        match parse_epp_log_file(base_dir, path, target_addresses) {
            Ok(parsed) => samples.extend(parsed),
            Err(e) => warn!("skipping epp log: {}", e),
        }
    }

    sort_samples(&mut samples);
    Ok(samples)
}

fn sort_samples(samples: &mut [PodSample]) {
    samples.sort_by(|a, b| {
        a.experiment
            .cmp(&b.experiment)
            .then_with(|| a.pod_address.cmp(&b.pod_address))
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
}
