//! Small statistics helpers shared by the aggregation passes
//!
//! Missing values are modelled as [`None`]; none of these helpers ever yield
//! NaN or infinity.

/// Percentile of `values` using linear interpolation between closest ranks.
///
/// `p` is in `0.0..=100.0`. The input does not need to be sorted.
/// Returns [`None`] for empty input.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, p))
}

/// Same as [`percentile`], but `sorted` must already be in ascending order
/// and non-empty.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Arithmetic mean, [`None`] for empty input
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean of the values that are present
pub fn mean_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let present: Vec<f64> = values.into_iter().flatten().collect();
    mean(&present)
}

/// Sum of the values that are present, [`None`] when nothing is present
pub fn sum_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, value| Some(acc.unwrap_or(0.0) + value))
}

/// `numerator / denominator`, absent when either side is missing, the
/// denominator is zero, or the result is not finite
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (numerator, denominator) = (numerator?, denominator?);
    if denominator == 0.0 {
        return None;
    }
    finite(numerator / denominator)
}

/// Drops NaN and infinities
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Σ(value · weight) over entries with a value, divided by Σ weight over all entries
pub fn weighted_mean<I>(entries: I) -> Option<f64>
where
    I: IntoIterator<Item = (Option<f64>, f64)>,
{
    let mut numerator = None;
    let mut total_weight = 0.0;
    for (value, weight) in entries {
        total_weight += weight;
        if let Some(value) = value {
            numerator = Some(numerator.unwrap_or(0.0) + value * weight);
        }
    }
    ratio(numerator, Some(total_weight))
}
