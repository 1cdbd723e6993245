//! Execution requests and results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Error text reported for runs that hit their deadline.
pub const TIMEOUT_MESSAGE: &str = "Execution timeout";

/// Exit code reported for every failure that is not the program's own.
pub const FAILURE_EXIT_CODE: i64 = 1;

/// A request to run one program.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutionRequest {
    /// Language id, e.g. `python`.
    pub language: String,
    /// Source text.
    pub code: String,
    /// Text written once to the program's stdin.
    #[serde(default, alias = "input")]
    pub stdin: Option<String>,
}

impl ExecutionRequest {
    /// Request without stdin.
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            stdin: None,
        }
    }

    /// Attach one-shot stdin.
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Exit code zero.
    Success,
    /// The program ran to completion with a nonzero exit code.
    RuntimeError,
    /// The deadline expired and the sandbox was killed.
    Timeout,
    /// Provisioning or sandbox setup failed; user code never ran.
    InfraError,
    /// The language id is not registered.
    UnsupportedLanguage,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::RuntimeError => write!(f, "runtime_error"),
            Self::Timeout => write!(f, "timeout"),
            Self::InfraError => write!(f, "infra_error"),
            Self::UnsupportedLanguage => write!(f, "unsupported_language"),
        }
    }
}

/// Normalized result of one execution.
///
/// Serializes to `{ output, error, exitCode, executionTime }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Captured stdout.
    pub output: String,
    /// Captured stderr, or a failure message.
    pub error: String,
    /// Program exit code, or 1 for engine-side failures.
    pub exit_code: i64,
    /// Wall time in milliseconds.
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
    /// Outcome classification.
    #[serde(skip)]
    pub outcome: Outcome,
}

impl ExecutionResult {
    /// Classify a program that ran to completion.
    pub fn exited(output: String, error: String, exit_code: i64, elapsed: Duration) -> Self {
        let outcome = if exit_code == 0 {
            Outcome::Success
        } else {
            Outcome::RuntimeError
        };
        Self {
            output,
            error,
            exit_code,
            execution_time_ms: millis(elapsed),
            outcome,
        }
    }

    /// A run that was killed at its deadline; partial output is dropped.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::failure(Outcome::Timeout, TIMEOUT_MESSAGE.to_string(), elapsed)
    }

    /// A failure before the program started running.
    pub fn infra_error(message: impl Into<String>, elapsed: Duration) -> Self {
        Self::failure(Outcome::InfraError, message.into(), elapsed)
    }

    /// A request for a language outside the registry.
    pub fn unsupported_language(message: impl Into<String>, elapsed: Duration) -> Self {
        Self::failure(Outcome::UnsupportedLanguage, message.into(), elapsed)
    }

    /// Whether the program exited with code zero.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    fn failure(outcome: Outcome, error: String, elapsed: Duration) -> Self {
        Self {
            output: String::new(),
            error,
            exit_code: FAILURE_EXIT_CODE,
            execution_time_ms: millis(elapsed),
            outcome,
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
