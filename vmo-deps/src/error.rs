//! Error types for dependency reconciliation.

use thiserror::Error;

use crate::types::DependencyList;

/// Errors surfaced by a [`ResourceClient`](crate::clients::ResourceClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The named resource does not exist in the scope.
    #[error("resource {name} not found in {scope}")]
    NotFound { scope: String, name: String },

    /// Transport, rate-limit or authorization failure.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// The call was abandoned because the run was cancelled.
    #[error("remote call cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Errors surfaced by a [`StatusPersister`](crate::persist::StatusPersister).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid owner id {0:?}")]
    InvalidOwner(String),

    #[error("{0}")]
    Rejected(String),
}

/// Errors that end a reconciliation or cleanup run.
#[derive(Debug, Error)]
pub enum DepError {
    /// Remote API failure other than "not found".
    #[error(transparent)]
    Client(ClientError),

    /// Invalid configuration, e.g. a region without a fault domain mapping.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The run's cancellation token fired.
    #[error("reconciliation cancelled")]
    Cancelled,

    /// Status could not be stored; no algorithm error preceded it.
    #[error("failed to persist dependency status: {0}")]
    Persistence(#[source] PersistError),

    /// Status could not be stored after the algorithm had already failed.
    #[error("{algorithm}: failed to persist dependency status: {persist}")]
    PersistenceAfter {
        algorithm: Box<DepError>,
        persist: PersistError,
    },
}

impl DepError {
    /// Combine a persistence failure with the error of the run that produced
    /// the list, if any. The run's error stays first in the message.
    pub fn with_persistence(prior: Option<DepError>, persist: PersistError) -> Self {
        match prior {
            Some(algorithm) => DepError::PersistenceAfter {
                algorithm: Box::new(algorithm),
                persist,
            },
            None => DepError::Persistence(persist),
        }
    }

    /// The error of the run itself, looking through persistence wrappers.
    pub fn algorithm_error(&self) -> Option<&DepError> {
        match self {
            DepError::Persistence(_) => None,
            DepError::PersistenceAfter { algorithm, .. } => Some(algorithm),
            other => Some(other),
        }
    }
}

impl From<ClientError> for DepError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Cancelled => DepError::Cancelled,
            other => DepError::Client(other),
        }
    }
}

/// A run that stopped early. `dependencies` is the list as it stood when the
/// error occurred and must be persisted so no tracking information is lost.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Aborted {
    pub dependencies: DependencyList,
    #[source]
    pub error: DepError,
}

impl Aborted {
    pub fn new(dependencies: DependencyList, error: impl Into<DepError>) -> Self {
        Self {
            dependencies,
            error: error.into(),
        }
    }

    pub fn into_parts(self) -> (DependencyList, DepError) {
        (self.dependencies, self.error)
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, DepError>;
