// Case Runner: one test case in, one CaseResult out

use crate::backend::{ExecutionBackend, ExecutionOutcome};
use crate::comparator::OutputComparator;
use judge_common::types::{CaseResult, ContractViolation, FunctionSchema, TestCase};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs a single test case against the execution backend.
///
/// Stateless across calls. Every backend outcome, including infrastructure
/// errors and timeouts, becomes a `CaseResult`; the only error returned is a
/// contract violation in the schema itself.
#[derive(Clone)]
pub struct CaseRunner {
    backend: Arc<dyn ExecutionBackend>,
    comparator: Arc<dyn OutputComparator>,
    timeout: Duration,
}

impl CaseRunner {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        comparator: Arc<dyn OutputComparator>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            comparator,
            timeout,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Execute `test_case` and record it as case number `case_no`
    pub async fn run(
        &self,
        case_no: u32,
        schema: &FunctionSchema,
        test_case: &TestCase,
    ) -> Result<CaseResult, ContractViolation> {
        schema.validate()?;

        let start = Instant::now();
        let outcome =
            tokio::time::timeout(self.timeout, self.backend.execute(schema, &test_case.input))
                .await;
        let elapsed_seconds = start.elapsed().as_secs_f64();

        let (actual_output, console_output, memory_mb, passed) = match outcome {
            Ok(Ok(ExecutionOutcome::Completed { output, console_output, memory_mb })) => {
                let passed = self.comparator.matches(&output, &test_case.expected_output);
                (output, console_output, memory_mb, passed)
            }
            Ok(Ok(ExecutionOutcome::Failed { error_text, memory_mb })) => {
                debug!(case_no, test_id = %test_case.id, "Submitted code failed");
                (String::new(), error_text, memory_mb, false)
            }
            Ok(Err(e)) => {
                warn!(
                    case_no,
                    test_id = %test_case.id,
                    backend = self.backend.name(),
                    error = %e,
                    "Backend error; recording case as failed"
                );
                (String::new(), format!("Backend error: {}", e), None, false)
            }
            Err(_) => {
                warn!(
                    case_no,
                    test_id = %test_case.id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Execution timed out"
                );
                let text = format!("[Execution timed out after {}ms]", self.timeout.as_millis());
                (String::new(), text, None, false)
            }
        };

        debug!(
            case_no,
            test_id = %test_case.id,
            passed,
            elapsed_ms = (elapsed_seconds * 1000.0) as u64,
            "Case finished"
        );

        Ok(CaseResult {
            case_no,
            id: test_case.id.clone(),
            input: test_case.input.clone(),
            expected: test_case.expected_output.clone(),
            actual_output,
            console_output,
            elapsed_seconds,
            memory_mb: sanitize_memory(memory_mb),
            passed,
            is_sample: test_case.is_sample,
        })
    }
}

/// Unmeasured, negative or non-finite readings are recorded as 0
fn sanitize_memory(memory_mb: Option<f64>) -> f64 {
    match memory_mb {
        Some(mb) if mb.is_finite() && mb > 0.0 => mb,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, Step};
    use judge_common::types::ComparisonPolicy;

    fn runner(backend: ScriptedBackend, policy: ComparisonPolicy, timeout_ms: u64) -> CaseRunner {
        CaseRunner::new(Arc::new(backend), Arc::new(policy), Duration::from_millis(timeout_ms))
    }

    fn schema() -> FunctionSchema {
        FunctionSchema::new("add", "return a+b", ["integer", "integer"])
    }

    #[tokio::test]
    async fn test_matching_output_passes() {
        let backend = ScriptedBackend::new().on("1,2", Step::output("3").with_memory(1.5));
        let runner = runner(backend, ComparisonPolicy::Exact, 1000);

        let result = runner
            .run(1, &schema(), &TestCase::new("t1", "1,2", "3").sample())
            .await
            .unwrap();

        assert!(result.passed);
        assert_eq!(result.case_no, 1);
        assert_eq!(result.id, "t1");
        assert_eq!(result.actual_output, "3");
        assert_eq!(result.expected, "3");
        assert_eq!(result.input, "1,2");
        assert_eq!(result.memory_mb, 1.5);
        assert!(result.is_sample);
        assert!(result.elapsed_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_mismatch_fails() {
        let backend = ScriptedBackend::new().on("5,5", Step::output("10"));
        let runner = runner(backend, ComparisonPolicy::Exact, 1000);

        let result = runner.run(2, &schema(), &TestCase::new("t2", "5,5", "11")).await.unwrap();

        assert!(!result.passed);
        assert_eq!(result.actual_output, "10");
        assert_eq!(result.case_no, 2);
        assert_eq!(result.memory_mb, 0.0);
    }

    #[tokio::test]
    async fn test_comparator_is_a_parameter() {
        let case = TestCase::new("t1", "x", "3");

        let backend = || ScriptedBackend::new().on("x", Step::output("3\n"));

        let exact = runner(backend(), ComparisonPolicy::Exact, 1000);
        assert!(!exact.run(1, &schema(), &case).await.unwrap().passed);

        let trimmed = runner(backend(), ComparisonPolicy::Trimmed, 1000);
        assert!(trimmed.run(1, &schema(), &case).await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_execution_failure_recorded() {
        let backend = ScriptedBackend::new()
            .on("1,2", Step::failure("ZeroDivisionError").with_memory(2.0));
        let runner = runner(backend, ComparisonPolicy::Exact, 1000);

        let result = runner.run(1, &schema(), &TestCase::new("t1", "1,2", "3")).await.unwrap();

        assert!(!result.passed);
        assert_eq!(result.actual_output, "");
        assert_eq!(result.console_output, "ZeroDivisionError");
        assert_eq!(result.memory_mb, 2.0);
    }

    #[tokio::test]
    async fn test_backend_error_recorded() {
        let backend = ScriptedBackend::new().on("1,2", Step::unavailable("daemon unreachable"));
        let runner = runner(backend, ComparisonPolicy::Exact, 1000);

        let result = runner.run(1, &schema(), &TestCase::new("t1", "1,2", "3")).await.unwrap();

        assert!(!result.passed);
        assert_eq!(result.actual_output, "");
        assert!(result.console_output.contains("daemon unreachable"));
        assert_eq!(result.memory_mb, 0.0);
    }

    #[tokio::test]
    async fn test_timeout_recorded() {
        let backend = ScriptedBackend::new().on("1,2", Step::output("3").after_ms(500));
        let runner = runner(backend, ComparisonPolicy::Exact, 20);

        let result = runner.run(1, &schema(), &TestCase::new("t1", "1,2", "3")).await.unwrap();

        assert!(!result.passed);
        assert_eq!(result.actual_output, "");
        assert!(result.console_output.contains("timed out"));
        assert!(result.elapsed_seconds >= 0.02);
        assert!(result.elapsed_seconds < 0.5);
    }

    #[tokio::test]
    async fn test_malformed_schema_is_fatal() {
        let backend = ScriptedBackend::new();
        let calls = backend.calls();
        let runner = runner(backend, ComparisonPolicy::Exact, 1000);

        let schema = FunctionSchema::new("", "return 1", Vec::<String>::new());
        let err = runner.run(1, &schema, &TestCase::new("t1", "", "1")).await.unwrap_err();

        assert_eq!(err, ContractViolation::MissingField("name"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sanitize_memory() {
        assert_eq!(sanitize_memory(None), 0.0);
        assert_eq!(sanitize_memory(Some(-3.0)), 0.0);
        assert_eq!(sanitize_memory(Some(f64::NAN)), 0.0);
        assert_eq!(sanitize_memory(Some(12.5)), 12.5);
    }
}
