//! Lenient accessors over [`serde_json::Value`]
//!
//! Benchmark emitters are not consistent about which keys they write or
//! whether numbers arrive as numbers, strings or `null`. These helpers treat
//! anything unexpected as absent.

use serde_json::Value;

/// Follows `path` through nested objects. Missing keys and non-object
/// intermediates yield [`None`].
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// Numeric value at `path`, accepting JSON numbers and numeric strings
pub fn f64_at(value: &Value, path: &[&str]) -> Option<f64> {
    lookup(value, path).and_then(as_f64)
}

/// Integer count at `path`; missing, `null` or malformed values count as zero
pub fn count_at(value: &Value, path: &[&str]) -> u64 {
    lookup(value, path).map(as_count).unwrap_or(0)
}

/// Interprets a JSON value as a float
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

/// Interprets a JSON value as a non-negative integer count, truncating floats
pub fn as_count(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Value::String(text) => text.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_nested_objects() {
        let value = json!({"a": {"b": {"c": 1.5}}});
        assert_eq!(f64_at(&value, &["a", "b", "c"]), Some(1.5));
        assert_eq!(f64_at(&value, &["a", "x", "c"]), None);
    }

    #[test]
    fn lookup_stops_at_non_objects() {
        let value = json!({"a": [1, 2, 3]});
        assert!(lookup(&value, &["a", "b"]).is_none());
    }

    #[test]
    fn numbers_can_be_strings() {
        let value = json!({"rate": "2.5", "bad": "fast", "none": null});
        assert_eq!(f64_at(&value, &["rate"]), Some(2.5));
        assert_eq!(f64_at(&value, &["bad"]), None);
        assert_eq!(f64_at(&value, &["none"]), None);
    }

    #[test]
    fn counts_default_to_zero() {
        let value = json!({"a": 7, "b": null, "c": 3.9, "d": "12"});
        assert_eq!(count_at(&value, &["a"]), 7);
        assert_eq!(count_at(&value, &["b"]), 0);
        assert_eq!(count_at(&value, &["c"]), 3);
        assert_eq!(count_at(&value, &["d"]), 12);
        assert_eq!(count_at(&value, &["missing"]), 0);
    }
}
