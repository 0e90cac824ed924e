/// Judge Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Turn a submission into a verdict by wiring the pieces together:
/// 1. Resolve settings (submission overrides over driver defaults)
/// 2. Build the case runner around the chosen backend and comparator
/// 3. Run the suite (validation happens before any execution)
/// 4. Build the verdict
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (backend's job)
/// - How outputs are compared (comparator's job)
/// - How results are ordered and averaged (suite's job)

use crate::backend::ExecutionBackend;
use crate::error::DriverError;
use crate::report;
use crate::runner::CaseRunner;
use crate::suite::SuiteOrchestrator;
use judge_common::config::DriverSettings;
use judge_common::types::{Submission, Verdict};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Judge one submission. Returns a complete verdict or a fatal error, never a partial verdict.
pub async fn judge(
    submission: &Submission,
    backend: Arc<dyn ExecutionBackend>,
    settings: &DriverSettings,
    driver_id: &str,
    cancel: &CancellationToken,
) -> Result<Verdict, DriverError> {
    let settings = settings.clone().with_submission_overrides(submission)?;

    info!(
        function = %submission.schema.name,
        backend = backend.name(),
        test_count = submission.test_cases.len(),
        timeout_ms = settings.timeout_ms,
        comparator = %settings.comparison,
        "Judging submission"
    );

    let runner = CaseRunner::new(
        backend,
        Arc::new(settings.comparison.clone()),
        settings.timeout(),
    );
    let orchestrator = SuiteOrchestrator::new(runner, settings.concurrency);

    let outcome = orchestrator
        .run_suite(&submission.schema, &submission.test_cases, cancel)
        .await?;

    let verdict = report::build(
        outcome.results,
        outcome.avg_time_seconds,
        outcome.avg_memory_mb,
        driver_id,
    );

    info!(
        status = ?verdict.status,
        failed_case_no = ?verdict.first_failed_case_no,
        passed = verdict.passed_count(),
        total = verdict.results.len(),
        "Verdict ready"
    );

    Ok(verdict)
}
