use judge_common::config::SettingsError;
use judge_common::types::ContractViolation;

/// Errors that abort a whole run. A run ending in one of these produces no verdict.
///
/// Per-case failures never show up here: they are folded into the case's
/// `CaseResult` by the runner.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("suite cancelled before all cases completed")]
    Cancelled,
}
