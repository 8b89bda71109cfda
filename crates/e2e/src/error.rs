//! Error types for the rectangle E2E suite

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Assertion failed: {what} (expected {expected}, got {actual})")]
    AssertionFailed {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid scenario state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Operation '{operation}' not allowed in state {state}")]
    InvalidState { state: String, operation: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl E2eError {
    /// Build an assertion failure from anything printable
    pub fn assertion(
        what: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        E2eError::AssertionFailed {
            what: what.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
