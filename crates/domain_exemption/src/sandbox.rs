//! Sandboxed expression evaluator
//!
//! Rule scripts are run by the zen expression interpreter. The interpreter only
//! sees the JSON context built from the bindings: it has no way to reach host
//! objects, the filesystem or the network, and the language has no loops or
//! user-defined functions. Script text is treated as data and never compiled
//! into host code.
//!
//! Each evaluation runs on its own worker thread so the caller can bound it
//! with a timeout. A worker that overruns is abandoned rather than joined.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use zen_expression::{evaluate_expression, Variable};

use crate::error::ExemptionError;
use crate::script::{parse_bool_text, Bindings, ScriptEvaluator, ScriptKind};

/// Limits applied to every sandboxed evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Wall-clock bound per evaluation; `None` evaluates on the calling thread
    pub timeout: Option<Duration>,
    /// Maximum script length in bytes
    pub max_script_len: usize,
}

impl SandboxLimits {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);
    pub const DEFAULT_MAX_SCRIPT_LEN: usize = 4096;

    pub fn new(timeout: Option<Duration>, max_script_len: usize) -> Self {
        Self {
            timeout,
            max_script_len,
        }
    }
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Some(Self::DEFAULT_TIMEOUT),
            max_script_len: Self::DEFAULT_MAX_SCRIPT_LEN,
        }
    }
}

/// Evaluator for `EXPRESSION` scripts
#[derive(Debug, Clone, Default)]
pub struct SandboxedExpressionEvaluator {
    limits: SandboxLimits,
}

impl SandboxedExpressionEvaluator {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    fn check_size(&self, script: &str) -> Result<(), ExemptionError> {
        if script.len() > self.limits.max_script_len {
            return Err(ExemptionError::ScriptTooLarge {
                len: script.len(),
                max: self.limits.max_script_len,
            });
        }
        if script.trim().is_empty() {
            return Err(ExemptionError::ScriptExecution("script is empty".to_string()));
        }
        Ok(())
    }

    fn evaluate_with_timeout(
        &self,
        script: &str,
        context: Value,
        timeout: Duration,
    ) -> Result<bool, ExemptionError> {
        let (tx, rx) = mpsc::channel();
        let owned_script = script.to_string();

        thread::Builder::new()
            .name("exemption-script".to_string())
            .spawn(move || {
                // The receiver is gone when the caller already timed out.
                let _ = tx.send(run_expression(&owned_script, context));
            })
            .map_err(|e| {
                ExemptionError::ScriptExecution(format!("failed to start sandbox worker: {}", e))
            })?;

        match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome.map_err(ExemptionError::ScriptExecution),
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Exemption script timed out");
                Err(ExemptionError::ScriptTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ExemptionError::ScriptExecution(
                "sandbox worker terminated without a result".to_string(),
            )),
        }
    }
}

impl ScriptEvaluator for SandboxedExpressionEvaluator {
    fn kind(&self) -> ScriptKind {
        ScriptKind::expression()
    }

    fn evaluate(&self, script: &str, bindings: &Bindings) -> Result<bool, ExemptionError> {
        self.check_size(script)?;
        let context = bindings.to_context();

        let result = match self.limits.timeout {
            Some(timeout) => self.evaluate_with_timeout(script, context, timeout),
            None => run_expression(script, context).map_err(ExemptionError::ScriptExecution),
        };

        debug!(script, ok = result.is_ok(), "Evaluated exemption script");
        result
    }
}

/// Runs one expression inside the interpreter and coerces its result
fn run_expression(script: &str, context: Value) -> Result<bool, String> {
    let result = evaluate_expression(script, Variable::from(context))
        .map_err(|e| format!("{:?}", e))?;
    Ok(coerce_variable(&result))
}

fn coerce_variable(result: &Variable) -> bool {
    match result {
        Variable::Bool(b) => *b,
        Variable::Null => false,
        Variable::String(s) => parse_bool_text(s),
        // Numbers, arrays and objects never read as "true".
        _ => false,
    }
}
