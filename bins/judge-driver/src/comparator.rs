/// Output Comparator - Pass/Fail Policy
///
/// **Core Responsibility:**
/// Decide whether a function's actual output matches the expected output.
///
/// **Critical Properties:**
/// - Knows nothing about how the function was executed
/// - Pure function: (actual, expected) → bool
///
/// **Built-in Policies:**
/// - `Exact`: byte-for-byte equality (the default)
/// - `Trimmed`: leading/trailing whitespace ignored, internal whitespace and case kept
/// - `Json`: both sides parsed as JSON values; falls back to exact equality when
///   either side is not valid JSON
/// - `Float`: whitespace-separated tokens, numeric tokens equal within epsilon
///   (absolute or relative), other tokens compared exactly

use judge_common::types::ComparisonPolicy;

pub trait OutputComparator: Send + Sync {
    fn matches(&self, actual: &str, expected: &str) -> bool;
}

impl OutputComparator for ComparisonPolicy {
    fn matches(&self, actual: &str, expected: &str) -> bool {
        match self {
            ComparisonPolicy::Exact => actual == expected,
            ComparisonPolicy::Trimmed => normalize_output(actual) == normalize_output(expected),
            ComparisonPolicy::Json => json_matches(actual, expected),
            ComparisonPolicy::Float { epsilon } => float_matches(actual, expected, *epsilon),
        }
    }
}

/// Trim leading and trailing whitespace (also absorbs \r\n vs \n at the ends)
fn normalize_output(output: &str) -> &str {
    output.trim()
}

fn json_matches(actual: &str, expected: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(actual.trim()),
        serde_json::from_str::<serde_json::Value>(expected.trim()),
    ) {
        (Ok(a), Ok(e)) => a == e,
        _ => actual == expected,
    }
}

fn float_matches(actual: &str, expected: &str, epsilon: f64) -> bool {
    let mut actual_tokens = actual.split_whitespace();
    let mut expected_tokens = expected.split_whitespace();

    loop {
        match (actual_tokens.next(), expected_tokens.next()) {
            (None, None) => return true,
            (Some(a), Some(e)) => {
                if !token_matches(a, e, epsilon) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

fn token_matches(actual: &str, expected: &str, epsilon: f64) -> bool {
    if actual == expected {
        return true;
    }
    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(e)) if a.is_finite() && e.is_finite() => {
            let diff = (a - e).abs();
            diff <= epsilon || diff <= epsilon * e.abs().max(a.abs())
        }
        _ => false,
    }
}
