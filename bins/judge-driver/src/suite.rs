/// Suite Orchestrator - Run Every Test Case of a Submission
///
/// **Core Responsibility:**
/// Drive the case runner over an ordered list of test cases and aggregate
/// timing and memory.
///
/// **Ordering Guarantees:**
/// - `caseNo` is the 1-based position in the input, never completion order
/// - Results come back in input order even when cases run in parallel
///   (`buffered` yields in submission order)
///
/// **Failure Policy:**
/// - A failing case is recorded and the suite continues (no short-circuit)
/// - Contract violations abort before any case executes
/// - Cancellation drops every in-flight execution and returns no results

use crate::error::DriverError;
use crate::runner::CaseRunner;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use judge_common::types::{validate_test_cases, CaseResult, FunctionSchema, TestCase};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Per-case results plus their averages, at full precision
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteOutcome {
    pub results: Vec<CaseResult>,
    pub avg_time_seconds: f64,
    pub avg_memory_mb: f64,
}

pub struct SuiteOrchestrator {
    runner: CaseRunner,
    concurrency: usize,
}

impl SuiteOrchestrator {
    /// `concurrency` is the maximum number of cases executing at once (at least 1)
    pub fn new(runner: CaseRunner, concurrency: usize) -> Self {
        Self {
            runner,
            concurrency: concurrency.max(1),
        }
    }

    #[instrument(
        skip(self, schema, test_cases, cancel),
        fields(
            function = %schema.name,
            backend = self.runner.backend_name(),
            test_count = test_cases.len(),
            concurrency = self.concurrency
        )
    )]
    pub async fn run_suite(
        &self,
        schema: &FunctionSchema,
        test_cases: &[TestCase],
        cancel: &CancellationToken,
    ) -> Result<SuiteOutcome, DriverError> {
        schema.validate()?;
        validate_test_cases(test_cases)?;

        let suite_start = Instant::now();
        info!("Starting suite");

        let run_all = stream::iter(test_cases.iter().enumerate())
            .map(|(idx, test_case)| self.runner.run(idx as u32 + 1, schema, test_case))
            .buffered(self.concurrency)
            .try_collect::<Vec<CaseResult>>();

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Suite cancelled; discarding in-flight cases");
                return Err(DriverError::Cancelled);
            }
            results = run_all => results?,
        };

        let count = results.len() as f64;
        let total_time: f64 = results.iter().map(|r| r.elapsed_seconds).sum();
        let total_memory: f64 = results.iter().map(|r| r.memory_mb).sum();
        let passed = results.iter().filter(|r| r.passed).count();

        info!(
            passed,
            failed = results.len() - passed,
            suite_ms = suite_start.elapsed().as_millis() as u64,
            "Suite completed"
        );

        Ok(SuiteOutcome {
            avg_time_seconds: total_time / count,
            avg_memory_mb: total_memory / count,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, Step};
    use judge_common::types::{ComparisonPolicy, ContractViolation};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    fn orchestrator(backend: ScriptedBackend, concurrency: usize) -> SuiteOrchestrator {
        let runner = CaseRunner::new(
            Arc::new(backend),
            Arc::new(ComparisonPolicy::Exact),
            Duration::from_secs(5),
        );
        SuiteOrchestrator::new(runner, concurrency)
    }

    fn schema() -> FunctionSchema {
        FunctionSchema::new("echo", "return x", ["string"])
    }

    #[tokio::test]
    async fn test_empty_input_is_contract_violation() {
        let backend = ScriptedBackend::new();
        let calls = backend.calls();
        let suite = orchestrator(backend, 1);

        let err = suite.run_suite(&schema(), &[], &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, DriverError::ContractViolation(ContractViolation::EmptyInput)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_schema_fails_before_execution() {
        let backend = ScriptedBackend::new().on("a", Step::output("a"));
        let calls = backend.calls();
        let suite = orchestrator(backend, 1);

        let bad = FunctionSchema::new("echo", "return x", ["widget"]);
        let err = suite
            .run_suite(&bad, &[TestCase::new("t1", "a", "a")], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DriverError::ContractViolation(ContractViolation::UnknownArgType(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_order_preserved_under_parallelism() {
        // Earlier cases are slower, so they complete last
        let backend = ScriptedBackend::new()
            .on("a", Step::output("a").after_ms(120))
            .on("b", Step::output("b").after_ms(80))
            .on("c", Step::output("c").after_ms(40))
            .on("d", Step::output("d"));
        let suite = orchestrator(backend, 4);

        let cases: Vec<TestCase> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, input)| TestCase::new(format!("t{}", i + 1), *input, *input))
            .collect();

        let outcome = suite.run_suite(&schema(), &cases, &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.results.len(), 4);
        for (i, result) in outcome.results.iter().enumerate() {
            assert_eq!(result.case_no, i as u32 + 1);
            assert_eq!(result.id, cases[i].id);
            assert_eq!(result.actual_output, cases[i].input);
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut backend = ScriptedBackend::new();
        for i in 0..6 {
            backend = backend.on(&i.to_string(), Step::output("ok").after_ms(30));
        }
        let max_in_flight = backend.max_in_flight();
        let suite = orchestrator(backend, 2);

        let cases: Vec<TestCase> = (0..6)
            .map(|i| TestCase::new(format!("t{}", i), i.to_string(), "ok"))
            .collect();

        let outcome = suite.run_suite(&schema(), &cases, &CancellationToken::new()).await.unwrap();

        assert!(outcome.results.iter().all(|r| r.passed));
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_do_not_short_circuit() {
        let backend = ScriptedBackend::new()
            .on("1", Step::failure("SyntaxError"))
            .on("2", Step::unavailable("connection refused"))
            .on("3", Step::output("3"));
        let calls = backend.calls();
        let suite = orchestrator(backend, 1);

        let cases = vec![
            TestCase::new("t1", "1", "1"),
            TestCase::new("t2", "2", "2"),
            TestCase::new("t3", "3", "3").sample(),
        ];

        let outcome = suite.run_suite(&schema(), &cases, &CancellationToken::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let passed: Vec<bool> = outcome.results.iter().map(|r| r.passed).collect();
        assert_eq!(passed, vec![false, false, true]);
        assert!(outcome.results[2].is_sample);
    }

    #[tokio::test]
    async fn test_averages_are_arithmetic_means() {
        let backend = ScriptedBackend::new()
            .on("1", Step::output("1").with_memory(1.0))
            .on("2", Step::output("2").with_memory(2.5))
            .on("3", Step::failure("boom"));
        let suite = orchestrator(backend, 3);

        let cases = vec![
            TestCase::new("t1", "1", "1"),
            TestCase::new("t2", "2", "2"),
            TestCase::new("t3", "3", "3"),
        ];

        let outcome = suite.run_suite(&schema(), &cases, &CancellationToken::new()).await.unwrap();

        let expected_time: f64 =
            outcome.results.iter().map(|r| r.elapsed_seconds).sum::<f64>() / 3.0;
        assert!((outcome.avg_time_seconds - expected_time).abs() < 1e-6);
        assert!((outcome.avg_memory_mb - 3.5 / 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_cancellation_returns_no_results() {
        let backend = ScriptedBackend::new()
            .on("fast", Step::output("fast"))
            .on("slow", Step::output("slow").after_ms(5_000));
        let suite = orchestrator(backend, 2);

        let cases = vec![TestCase::new("t1", "fast", "fast"), TestCase::new("t2", "slow", "slow")];
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = suite.run_suite(&schema(), &cases, &cancel).await.unwrap_err();

        assert!(matches!(err, DriverError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
