//! Error types for the querylab workbench core.

use thiserror::Error;

/// Errors raised at the transport boundary (fetcher contract and remote failures)
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("fetcher returned neither a Single nor a Stream: {0}")]
    NeitherSingleNorStream(String),

    #[error("no value resolved")]
    EmptyStream,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response is not valid JSON: {0}")]
    InvalidResponse(String),

    #[error("Remote error: {0}")]
    Remote(String),
}

/// Errors raised before a run is dispatched
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("Variables are invalid JSON: {0}.")]
    InvalidVariables(String),

    #[error("Variables are not a JSON object.")]
    VariablesNotObject,
}

/// Snapshot encode/decode and persistence errors
#[derive(Debug, Clone, Error)]
pub enum SnapshotError {
    #[error("Please make sure the query exists!")]
    MissingQuery,

    #[error("Snapshot payload is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Snapshot could not be encoded: {0}")]
    Encode(String),

    #[error("Snapshot payload could not be decoded: {0}")]
    Decode(String),

    #[error("Fail to generate snapshotURL due to network or backend error")]
    SaveRejected,

    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Invalid snapshot URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Session identity errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid header override `{0}` (expected NAME=VALUE)")]
    InvalidHeader(String),

    #[error("Session store I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Session store is corrupt: {0}")]
    Corrupt(String),
}

/// Top-level error surfaced by the workbench and the CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Query does not parse: {0}")]
    QueryParse(String),

    #[error("Run failed: {0}")]
    RunFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
