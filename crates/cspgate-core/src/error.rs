//! Error types for CSPGate

use thiserror::Error;

/// Result type alias for CSPGate operations
pub type CspGateResult<T> = Result<T, CspGateError>;

/// Main error type for CSPGate
#[derive(Error, Debug)]
pub enum CspGateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Rewrite error: {0}")]
    Rewrite(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CspGateError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new scan error
    pub fn scan(msg: impl Into<String>) -> Self {
        Self::Scan(msg.into())
    }

    /// Create a new upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a new rewrite error
    pub fn rewrite(msg: impl Into<String>) -> Self {
        Self::Rewrite(msg.into())
    }

    /// Create a new certificate error
    pub fn certificate(msg: impl Into<String>) -> Self {
        Self::Certificate(msg.into())
    }
}
