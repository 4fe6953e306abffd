use std::sync::Arc;
use thiserror::Error;

use crate::model::Id;

/// Failure of an apply preview.
///
/// Cloneable so that a failed computation can be memoized and handed to every
/// later caller in the same request.
#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("batch spec {0} not found")]
    BatchSpecNotFound(Id),

    #[error("changeset spec {0} not found")]
    ChangesetSpecNotFound(Id),

    #[error("repository {0} not found")]
    RepoNotFound(Id),

    #[error("unsupported code host for repository {0}")]
    UnsupportedCodeHost(String),

    #[error("batch spec cannot be applied: {0}")]
    Reconciliation(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("store error: {0}")]
    Store(Arc<anyhow::Error>),

    #[error("request cancelled")]
    Cancelled,
}

impl PreviewError {
    pub fn store(err: anyhow::Error) -> Self {
        PreviewError::Store(Arc::new(err))
    }

    /// Only the requested batch spec can be missing. Specs or repos that
    /// vanish while planning are inconsistencies, not client errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PreviewError::BatchSpecNotFound(_))
    }
}

pub type PreviewResult<T> = Result<T, PreviewError>;
