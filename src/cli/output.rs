//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, SnapshotError};

/// Map domain errors to the text printed on stderr. Messages users act on directly
/// (bad variables, missing query, failed share) are printed without a category prefix.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Execution(inner) => inner.to_string(),
        ApiError::Snapshot(inner @ (SnapshotError::MissingQuery | SnapshotError::SaveRejected)) => {
            inner.to_string()
        }
        ApiError::RunFailed(text) => text.clone(),
        _ => e.to_string(),
    }
}
