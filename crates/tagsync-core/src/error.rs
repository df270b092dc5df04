use thiserror::Error;

use crate::{catalog::CatalogError, leader::LeaseError, tags::TagStoreError};

/// Errors that stop the controller (startup and supervisor failures).
///
/// Runtime reconcile failures never surface here; they are settled per tag by the workers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("lease error: {0}")]
    Lease(#[from] LeaseError),

    #[error("tag store error: {0}")]
    Tags(#[from] TagStoreError),

    #[error("supervisor error: {0}")]
    Supervisor(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
