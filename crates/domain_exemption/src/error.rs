//! Exemption domain errors

use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur while loading or evaluating exemptions
#[derive(Debug, Error)]
pub enum ExemptionError {
    /// A rule names a script kind with no registered evaluator
    #[error("Unsupported script kind: {0}")]
    UnsupportedScriptKind(String),

    /// Evaluators or exemption configuration are inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The sandboxed script failed to parse or run
    #[error("Script execution failed: {0}")]
    ScriptExecution(String),

    /// The sandboxed script did not finish in time
    #[error("Script timed out after {timeout_ms}ms")]
    ScriptTimeout { timeout_ms: u64 },

    /// The script body exceeds the configured size limit
    #[error("Script is {len} bytes, limit is {max}")]
    ScriptTooLarge { len: usize, max: usize },

    /// Failed to parse an exemption configuration document
    #[error("Failed to parse exemption configuration: {0}")]
    Parse(String),

    /// Failed to read an exemption configuration file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A collaborator port failed
    #[error(transparent)]
    Port(#[from] PortError),
}

impl ExemptionError {
    /// Returns true for failures raised by the script sandbox
    pub fn is_script_failure(&self) -> bool {
        matches!(
            self,
            ExemptionError::ScriptExecution(_)
                | ExemptionError::ScriptTimeout { .. }
                | ExemptionError::ScriptTooLarge { .. }
        )
    }
}
