use thiserror::Error;

/// Failure of a single acquisition. Neither variant is fatal: the next
/// scheduled tick simply tries again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquireError {
    /// The live API refused the credential; it must be re-entered.
    #[error("credential rejected: {0}")]
    Auth(String),
    /// Network, HTTP or payload problem; previous data stays on screen.
    #[error("transient acquisition failure: {0}")]
    Transient(String),
}

/// An incoming payload lacks a field the history needs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload field `{0}` is missing or not numeric")]
    MissingField(&'static str),
}

impl From<PayloadError> for AcquireError {
    fn from(err: PayloadError) -> Self {
        AcquireError::Transient(err.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("API key is empty")]
    Empty,
    #[error("API key must be {expected} characters long, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
