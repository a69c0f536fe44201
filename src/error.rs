//! Errors returned while configuring, calling, or writing the results of the
//! document analysis service.
//!
//! The CLI layer converts these into [`anyhow::Error`] values, but library
//! code returns them directly so that callers (and tests) can tell a missing
//! credential from an unreadable file from a remote failure.

use std::{error, fmt, io, time::Duration};

use reqwest::StatusCode;

use crate::prelude::*;

/// An error which occurred while analyzing a document.
#[derive(Debug)]
pub enum AnalysisError {
    /// Missing or invalid service configuration. Always reported before we
    /// touch the network.
    Configuration(String),

    /// We couldn't read an input file or write an output file.
    Io {
        /// The path we were trying to access.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The remote service (or the network between us) reported an error.
    RemoteService(RemoteServiceError),

    /// The caller asked for a timeout, and the analysis took too long.
    Timeout(Duration),
}

impl AnalysisError {
    /// Build an [`AnalysisError::Io`] for `path`.
    pub fn io(path: &Path, source: io::Error) -> Self {
        AnalysisError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            AnalysisError::Io { path, source } => {
                write!(f, "I/O error on {}: {source}", path.display())
            }
            AnalysisError::RemoteService(err) => write!(f, "remote service error: {err}"),
            AnalysisError::Timeout(timeout) => {
                write!(f, "analysis timed out after {} seconds", timeout.as_secs())
            }
        }
    }
}

impl error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            AnalysisError::Io { source, .. } => Some(source),
            AnalysisError::RemoteService(err) => Some(err),
            AnalysisError::Configuration(_) | AnalysisError::Timeout(_) => None,
        }
    }
}

impl From<RemoteServiceError> for AnalysisError {
    fn from(err: RemoteServiceError) -> Self {
        AnalysisError::RemoteService(err)
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::RemoteService(RemoteServiceError::Transport(err))
    }
}

/// Errors reported by the remote service. We never retry these.
#[derive(Debug)]
pub enum RemoteServiceError {
    /// We couldn't talk to the service at all, or couldn't read its response.
    Transport(reqwest::Error),

    /// The service rejected a request with an HTTP error status.
    Status {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    /// The analysis operation finished without succeeding.
    OperationFailed {
        status: String,
        code: Option<String>,
        message: String,
    },

    /// The service returned something we didn't understand.
    InvalidResponse(String),
}

impl fmt::Display for RemoteServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteServiceError::Transport(err) => write!(f, "HTTP error: {err}"),
            RemoteServiceError::Status {
                status,
                code: Some(code),
                message,
            } => write!(f, "HTTP status {status} ({code}): {message}"),
            RemoteServiceError::Status {
                status,
                code: None,
                message,
            } => write!(f, "HTTP status {status}: {message}"),
            RemoteServiceError::OperationFailed {
                status,
                code: Some(code),
                message,
            } => write!(f, "analysis {status} ({code}): {message}"),
            RemoteServiceError::OperationFailed {
                status,
                code: None,
                message,
            } => write!(f, "analysis {status}: {message}"),
            RemoteServiceError::InvalidResponse(msg) => {
                write!(f, "invalid response: {msg}")
            }
        }
    }
}

impl error::Error for RemoteServiceError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            RemoteServiceError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_service_code() {
        let err = AnalysisError::from(RemoteServiceError::Status {
            status: StatusCode::UNAUTHORIZED,
            code: Some("401".to_owned()),
            message: "Access denied due to invalid subscription key.".to_owned(),
        });
        let msg = err.to_string();
        assert!(msg.contains("401 Unauthorized"));
        assert!(msg.contains("invalid subscription key"));
    }

    #[test]
    fn test_io_error_has_source() {
        let err = AnalysisError::io(
            Path::new("missing.pdf"),
            io::Error::new(io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.to_string().contains("missing.pdf"));
        assert!(error::Error::source(&err).is_some());
    }
}
