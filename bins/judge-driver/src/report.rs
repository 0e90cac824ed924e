// Report Builder: suite results -> Verdict

use judge_common::types::{CaseResult, Verdict, VerdictStatus};

/// Assemble the verdict for a finished suite.
///
/// The first failing result (lowest `caseNo`) decides `FAILED` and
/// `first_failed_case_no`. Averages are stored at full precision; the two
/// decimal display rounding happens when the verdict is serialized.
pub fn build(results: Vec<CaseResult>, avg_time: f64, avg_memory: f64, driver_id: &str) -> Verdict {
    build_at(results, avg_time, avg_memory, driver_id, chrono::Utc::now().timestamp())
}

fn build_at(
    results: Vec<CaseResult>,
    avg_time: f64,
    avg_memory: f64,
    driver_id: &str,
    timestamp_epoch_seconds: i64,
) -> Verdict {
    let first_failed_case_no = results.iter().find(|r| !r.passed).map(|r| r.case_no);

    let status = match first_failed_case_no {
        Some(_) => VerdictStatus::Failed,
        None => VerdictStatus::Passed,
    };

    Verdict {
        status,
        first_failed_case_no,
        avg_time_seconds: avg_time,
        avg_memory_mb: avg_memory,
        results,
        driver_id: driver_id.to_string(),
        timestamp_epoch_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(case_no: u32, passed: bool) -> CaseResult {
        CaseResult {
            case_no,
            elapsed_seconds: 0.01,
            memory_mb: 0.5,
            passed,
            actual_output: String::new(),
            is_sample: false,
            input: String::new(),
            expected: String::new(),
            id: format!("t{}", case_no),
            console_output: String::new(),
        }
    }

    #[test]
    fn test_all_passed() {
        let verdict = build_at(vec![make_result(1, true), make_result(2, true)], 0.01, 0.5, "d", 7);

        assert_eq!(verdict.status, VerdictStatus::Passed);
        assert_eq!(verdict.first_failed_case_no, None);
        assert_eq!(verdict.timestamp_epoch_seconds, 7);
        assert_eq!(verdict.driver_id, "d");
    }

    #[test]
    fn test_first_failure_wins() {
        let results = vec![
            make_result(1, true),
            make_result(2, false),
            make_result(3, true),
            make_result(4, false),
        ];

        let verdict = build_at(results, 0.0, 0.0, "d", 0);

        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert_eq!(verdict.first_failed_case_no, Some(2));
        assert_eq!(verdict.results.len(), 4);
    }

    #[test]
    fn test_averages_kept_at_full_precision() {
        let verdict = build_at(vec![make_result(1, true)], 0.123456, 1.0 / 3.0, "d", 0);

        assert_eq!(verdict.avg_time_seconds, 0.123456);
        assert_eq!(verdict.avg_memory_mb, 1.0 / 3.0);
    }

    #[test]
    fn test_timestamp_is_current() {
        let before = chrono::Utc::now().timestamp();
        let verdict = build(vec![make_result(1, true)], 0.0, 0.0, "d");
        let after = chrono::Utc::now().timestamp();

        assert!(verdict.timestamp_epoch_seconds >= before);
        assert!(verdict.timestamp_epoch_seconds <= after);
    }
}
