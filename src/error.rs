use thiserror::Error;

/// Failures raised while checking a single target's balance.
#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("API request failed: {status} {reason}")]
    HttpStatus { status: u16, reason: String },
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("{0}")]
    ApiError(String),
    #[error("Target '{target}' has no {field} configured")]
    ConfigError { target: String, field: &'static str },
}

/// Coarse classification used for logging and for deciding how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Api,
    Config,
}

impl QuotaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuotaError::HttpStatus { .. } | QuotaError::NetworkError(_) => ErrorKind::Transport,
            QuotaError::ApiError(_) => ErrorKind::Api,
            QuotaError::ConfigError { .. } => ErrorKind::Config,
        }
    }

    /// HTTP status carried by a transport failure, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            QuotaError::HttpStatus { status, .. } => Some(*status),
            QuotaError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
