//! Error types for the suite

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("chromedriver failed to start: {0}")]
    WebDriverStartup(String),

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for {what}; last seen: {last}")]
    Timeout { what: String, last: String },

    #[error("Alias not set: @{0}")]
    MissingAlias(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver command failed: {0}")]
    Cmd(#[from] fantoccini::error::CmdError),

    #[error("WebDriver session failed: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),
}

impl E2eError {
    /// Errors a bounded wait should retry through rather than surface.
    ///
    /// Elements re-render between queries, so lookups, stale handles and
    /// briefly covered elements are expected while the page settles. A lost
    /// session or connection is not.
    pub fn is_transient(&self) -> bool {
        match self {
            E2eError::ElementNotFound(_) => true,
            E2eError::Cmd(e) => {
                e.is_stale_element_reference()
                    || e.is_no_such_element()
                    || e.is_element_not_interactable()
            }
            _ => false,
        }
    }
}

/// Shorthand for an assertion failure.
pub fn assertion(message: impl Into<String>) -> E2eError {
    E2eError::AssertionFailed(message.into())
}

pub type E2eResult<T> = Result<T, E2eError>;
