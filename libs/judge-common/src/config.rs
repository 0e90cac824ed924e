// Driver-wide configuration
use crate::types::{ComparisonPolicy, Submission};
use std::time::Duration;

/// Identifier stamped on every verdict. Set `JUDGE_DRIVER_ID` at build time to override.
pub const DRIVER_ID: &str = match option_env!("JUDGE_DRIVER_ID") {
    Some(id) => id,
    None => concat!("Rust v", env!("CARGO_PKG_VERSION")),
};

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

pub const ENV_TIMEOUT_MS: &str = "JUDGE_TIMEOUT_MS";
pub const ENV_CONCURRENCY: &str = "JUDGE_CONCURRENCY";
pub const ENV_COMPARATOR: &str = "JUDGE_COMPARATOR";

/// Submission document key carrying a per-submission timeout
pub const SUBMISSION_TIMEOUT_KEY: &str = "timeoutMs";

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("invalid value `{value}` for {key}: {reason}")]
pub struct SettingsError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Runtime settings for one suite run
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    /// Per-case execution timeout
    pub timeout_ms: u64,
    /// Maximum number of cases executing at once
    pub concurrency: usize,
    pub comparison: ComparisonPolicy,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            concurrency: default_concurrency(),
            comparison: ComparisonPolicy::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl DriverSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            settings.timeout_ms = parse_positive(ENV_TIMEOUT_MS, &raw)? as u64;
        }
        if let Some(raw) = lookup(ENV_CONCURRENCY) {
            settings.concurrency = parse_positive(ENV_CONCURRENCY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_COMPARATOR) {
            settings.comparison = raw.parse().map_err(|reason| SettingsError {
                key: ENV_COMPARATOR,
                value: raw.clone(),
                reason,
            })?;
        }

        Ok(settings)
    }

    /// Submission-level timeout and comparator take precedence over the environment
    pub fn with_submission_overrides(
        mut self,
        submission: &Submission,
    ) -> Result<Self, SettingsError> {
        if let Some(timeout_ms) = submission.timeout_ms {
            if timeout_ms == 0 {
                return Err(SettingsError {
                    key: SUBMISSION_TIMEOUT_KEY,
                    value: timeout_ms.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            self.timeout_ms = timeout_ms;
        }
        if let Some(ref comparison) = submission.comparator {
            self.comparison = comparison.clone();
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<usize, SettingsError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(SettingsError {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(SettingsError {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}
