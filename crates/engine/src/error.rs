//! The module contains the errors the engine can throw.
//!
//! Every pipeline stage maps collaborator failures into its own variant:
//!
//! - [`Auth`] the bank session could not be established, or either API
//!   refused the credentials.
//! - [`Fetch`] the statement could not be paginated to completion.
//! - [`Validation`] a statement page or transaction does not match the
//!   expected schema.
//! - [`Query`] a destination query failed during dedup or relation lookup.
//! - [`Write`] a single record could not be created.
//! - [`Config`] the engine was built or invoked with unusable parameters.
//!
//!  [`Auth`]: EngineError::Auth
//!  [`Fetch`]: EngineError::Fetch
//!  [`Validation`]: EngineError::Validation
//!  [`Query`]: EngineError::Query
//!  [`Write`]: EngineError::Write
//!  [`Config`]: EngineError::Config
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Statement fetch failed: {0}")]
    Fetch(String),
    #[error("Invalid transaction: {0}")]
    Validation(String),
    #[error("Destination query failed: {0}")]
    Query(String),
    #[error("Failed to create record for transaction \"{id}\": {reason}")]
    Write { id: String, reason: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn fetch(err: ApiError) -> Self {
        if err.is_auth() {
            return Self::Auth(err.to_string());
        }
        if matches!(err, ApiError::Decode(_)) {
            return Self::Validation(err.to_string());
        }
        Self::Fetch(err.to_string())
    }

    pub(crate) fn query(err: ApiError) -> Self {
        if err.is_auth() {
            return Self::Auth(err.to_string());
        }
        Self::Query(err.to_string())
    }

    pub(crate) fn write(id: &str, err: ApiError) -> Self {
        if err.is_auth() {
            return Self::Auth(err.to_string());
        }
        Self::Write {
            id: id.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Failure reported by an external API collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    /// A successful response whose body does not have the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("{status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// Returns `true` when the remote refused the credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}
