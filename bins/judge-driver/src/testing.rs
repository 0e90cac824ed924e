// Scripted in-memory backend for unit tests

use crate::backend::{BackendError, ExecutionBackend, ExecutionOutcome};
use async_trait::async_trait;
use judge_common::types::FunctionSchema;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Failure(String),
    Unavailable(String),
}

/// What the backend does for one input
#[derive(Debug, Clone)]
pub struct Step {
    reply: Reply,
    delay: Duration,
    memory_mb: Option<f64>,
}

impl Step {
    pub fn output(output: &str) -> Self {
        Self::reply(Reply::Output(output.to_string()))
    }

    pub fn failure(error_text: &str) -> Self {
        Self::reply(Reply::Failure(error_text.to_string()))
    }

    pub fn unavailable(reason: &str) -> Self {
        Self::reply(Reply::Unavailable(reason.to_string()))
    }

    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            memory_mb: None,
        }
    }

    pub fn with_memory(mut self, memory_mb: f64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    pub fn after_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }
}

/// Deterministic backend answering by test case input
#[derive(Default)]
pub struct ScriptedBackend {
    steps: HashMap<String, Step>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, input: &str, step: Step) -> Self {
        self.steps.insert(input.to_string(), step);
        self
    }

    /// Number of `execute` calls made so far
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Highest number of simultaneous executions observed
    pub fn max_in_flight(&self) -> Arc<AtomicUsize> {
        self.max_in_flight.clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        _schema: &FunctionSchema,
        input: &str,
    ) -> Result<ExecutionOutcome, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let step = self
            .steps
            .get(input)
            .cloned()
            .ok_or_else(|| {
                BackendError::Unavailable(format!("no scripted step for input {:?}", input))
            })?;

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        match step.reply {
            Reply::Output(output) => Ok(ExecutionOutcome::Completed {
                output,
                console_output: String::new(),
                memory_mb: step.memory_mb,
            }),
            Reply::Failure(error_text) => Ok(ExecutionOutcome::Failed {
                error_text,
                memory_mb: step.memory_mb,
            }),
            Reply::Unavailable(reason) => Err(BackendError::Unavailable(reason)),
        }
    }
}
