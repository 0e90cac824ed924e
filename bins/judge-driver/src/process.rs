/// Subprocess execution backend
///
/// Spawns a language harness once per test case. The harness receives the
/// function through environment variables and the test case input on stdin,
/// and reports through stdout (see `backend::split_harness_output`).
///
/// The child is spawned with `kill_on_drop`, so a case abandoned by a timeout
/// or a cancelled suite never leaves a process behind.

use crate::backend::{
    check_limits, describe_exit, split_harness_output, BackendError, ExecutionBackend,
    ExecutionOutcome,
};
use crate::config::BackendConfig;
use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use judge_common::types::FunctionSchema;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub struct ProcessBackend {
    name: String,
    command: String,
    args: Vec<String>,
}

impl ProcessBackend {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(&config.name, &config.command, &config.args))
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        schema: &FunctionSchema,
        input: &str,
    ) -> Result<ExecutionOutcome, BackendError> {
        check_limits(schema, input)?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .env("FUNCTION_NAME", &schema.name)
            .env("FUNCTION_BODY", general_purpose::STANDARD.encode(&schema.body))
            .env("ARG_SIGNATURE", schema.arg_signature.join(","))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let feed_input = async move {
            if let Some(mut stdin) = stdin {
                // The harness may exit without reading its input
                match stdin.write_all(input.as_bytes()).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };

        let (fed, output) = tokio::join!(feed_input, child.wait_with_output());
        fed?;
        let output = output?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let code = exit_code(&output.status);
            debug!(backend = %self.name, exit_code = code, "Harness exited with failure");
            return Ok(ExecutionOutcome::Failed {
                error_text: describe_exit(code, &stderr),
                memory_mb: None,
            });
        }

        let (result, console_output) = split_harness_output(&stdout, &stderr);
        Ok(ExecutionOutcome::Completed {
            output: result,
            console_output,
            memory_mb: None,
        })
    }
}

/// Exit code, with signal terminations mapped to the shell's 128+N convention
fn exit_code(status: &std::process::ExitStatus) -> i64 {
    if let Some(code) = status.code() {
        return code as i64;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal as i64;
        }
    }
    -1
}
