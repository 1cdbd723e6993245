//! Request and response bodies of the HTTP API.

use kiln_core::{ExecutionRequest, ExecutionResult};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteParams {
    /// Language to execute (python, java, cpp, c, javascript).
    pub language: String,

    /// Source code.
    pub code: String,

    /// Text fed to the program's stdin.
    #[serde(default)]
    pub input: Option<String>,
}

impl From<ExecuteParams> for ExecutionRequest {
    fn from(params: ExecuteParams) -> Self {
        Self {
            language: params.language,
            code: params.code,
            stdin: params.input,
        }
    }
}

/// Response of `POST /api/execute`.
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub result: ExecutionResult,
}

/// Response of `GET /api/execute/languages`.
#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub languages: Vec<&'static str>,
}

/// Response of `GET /api/execute/health`.
#[derive(Debug, Serialize)]
pub struct RuntimeHealthResponse {
    /// Whether the container runtime answered.
    pub healthy: bool,
    pub message: &'static str,
}

impl RuntimeHealthResponse {
    pub fn new(healthy: bool) -> Self {
        let message = if healthy {
            "Docker is running"
        } else {
            "Docker is not available"
        };
        Self { healthy, message }
    }
}

/// Error body for rejected requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,

    /// What exactly was wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// A malformed or oversized request.
    pub fn invalid_input(details: impl Into<String>) -> Self {
        Self {
            error: "Invalid input",
            details: Some(details.into()),
        }
    }
}
