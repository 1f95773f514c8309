//! Error types for aem-core

use thiserror::Error;

use crate::result::AemResult;

/// Errors raised by a [`Transport`](crate::transport::Transport) before any
/// response could be produced.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed (connection, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid base URL or request path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Required call parameter missing for the request
    #[error("Missing call parameter `{param}` for {operation}")]
    MissingParam { operation: String, param: String },

    /// The transport has nothing scripted or mapped for this operation
    #[error("Unexpected operation: {0}")]
    UnexpectedOperation(String),

    /// IO error (upload source, download target)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err.to_string())
    }
}

/// Errors surfaced to callers of the client and its resources.
///
/// Semantic failures (wrong status text, unexpected HTTP status) are *not*
/// errors; they come back as a non-success [`AemResult`]. Only the cases with
/// no meaningful partial result raise.
#[derive(Error, Debug)]
pub enum AemError {
    /// Transport failure, propagated unchanged and never retried
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The remote operation definitely failed
    #[error("{message}")]
    Operation {
        message: String,
        result: Box<AemResult>,
    },

    /// A status check never reached the expected state
    #[error("{}", result.message())]
    ConvergenceExhausted { attempts: u32, result: Box<AemResult> },
}

impl AemError {
    /// Build an [`AemError::Operation`] whose message mirrors the result's.
    pub fn operation(result: AemResult) -> Self {
        AemError::Operation {
            message: result.message().to_string(),
            result: Box::new(result),
        }
    }

    /// The last result observed before the error, if any.
    pub fn result(&self) -> Option<&AemResult> {
        match self {
            AemError::Transport(_) => None,
            AemError::Operation { result, .. } => Some(&**result),
            AemError::ConvergenceExhausted { result, .. } => Some(&**result),
        }
    }
}

/// Result type for aem-core operations
pub type Result<T> = std::result::Result<T, AemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convergence_error_displays_last_message() {
        let err = AemError::ConvergenceExhausted {
            attempts: 3,
            result: Box::new(AemResult::new("Package g/p-1.0 is not installed")),
        };
        assert_eq!(err.to_string(), "Package g/p-1.0 is not installed");
        assert!(err.result().is_some());
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err: AemError = TransportError::Http("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "HTTP error: connection refused");
        assert!(err.result().is_none());
    }
}
