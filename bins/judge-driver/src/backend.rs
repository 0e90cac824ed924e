/// Execution Backend - Abstraction for Running a Submitted Function
///
/// **Core Responsibility:**
/// Run the submitted function body against one test case input and report
/// the raw return value, console output and (when measurable) memory usage.
///
/// **Critical Architectural Boundary:**
/// - Backend knows HOW to execute (subprocess, container, in-process, remote)
/// - Backend does NOT compare outputs or decide pass/fail
/// - Backend releases every resource it acquires on all exit paths
///
/// Swapping backends never touches the case runner or the suite orchestrator.

use crate::config::{BackendConfig, BackendKind};
use crate::docker::DockerBackend;
use crate::process::ProcessBackend;
use anyhow::Result;
use async_trait::async_trait;
use judge_common::types::FunctionSchema;
use std::sync::Arc;

/// Safety limits to prevent pathological inputs from reaching a backend
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// What one execution produced
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The function returned
    Completed {
        output: String,
        console_output: String,
        memory_mb: Option<f64>,
    },
    /// The submitted code failed: crash, compile error, non-zero exit
    Failed {
        error_text: String,
        memory_mb: Option<f64>,
    },
}

impl ExecutionOutcome {
    pub fn completed(output: impl Into<String>) -> Self {
        ExecutionOutcome::Completed {
            output: output.into(),
            console_output: String::new(),
            memory_mb: None,
        }
    }
}

/// The backend could not produce any outcome at all.
/// This is an infrastructure problem, not a failure of the submitted code.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{what} exceeds maximum size of {limit} bytes")]
    InputTooLarge { what: &'static str, limit: usize },
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Execute `schema` with one test case input
    async fn execute(
        &self,
        schema: &FunctionSchema,
        input: &str,
    ) -> Result<ExecutionOutcome, BackendError>;
}

/// Reject bodies and inputs above the guardrail sizes
pub fn check_limits(schema: &FunctionSchema, input: &str) -> Result<(), BackendError> {
    if schema.body.len() > MAX_SOURCE_CODE_BYTES {
        return Err(BackendError::InputTooLarge {
            what: "function body",
            limit: MAX_SOURCE_CODE_BYTES,
        });
    }
    if input.len() > MAX_TEST_INPUT_BYTES {
        return Err(BackendError::InputTooLarge {
            what: "test input",
            limit: MAX_TEST_INPUT_BYTES,
        });
    }
    Ok(())
}

/// Split harness stdout into (return value, console output).
///
/// Harnesses print the function's return value as the last non-empty line of
/// stdout. Everything printed before it is console output from the
/// submitted code; stderr is appended to the console output.
pub fn split_harness_output(stdout: &str, stderr: &str) -> (String, String) {
    let trimmed = stdout.trim_end_matches(['\n', '\r']);
    let (console, output) = match trimmed.rfind('\n') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    };

    let mut console_output = console.trim_end_matches('\r').to_string();
    if !stderr.is_empty() {
        if !console_output.is_empty() {
            console_output.push('\n');
        }
        console_output.push_str(stderr.trim_end());
    }

    (output.trim_end_matches('\r').to_string(), console_output)
}

/// Describe a non-zero exit, flagging the usual kill signals
pub fn describe_exit(code: i64, stderr: &str) -> String {
    let mut text = stderr.trim_end().to_string();
    if !text.is_empty() {
        text.push('\n');
    }
    match code {
        137 => text.push_str("[Killed: likely OOM or exceeded memory limit]"),
        139 => text.push_str("[Killed: segmentation fault]"),
        _ => text.push_str(&format!("[Exited with code {}]", code)),
    }
    text
}

/// Build the backend described by a configuration entry
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn ExecutionBackend>> {
    match config.kind {
        BackendKind::Process => Ok(Arc::new(ProcessBackend::from_config(config)?)),
        BackendKind::Docker => Ok(Arc::new(DockerBackend::from_config(config)?)),
    }
}
