use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No routable workers in the registry")]
    NoWorkersAvailable,

    #[error("Timed out waiting for a concurrent assignment to finish")]
    LockTimeout,

    #[error("Lead '{0}' does not exist")]
    LeadNotFound(String),

    #[error("Worker '{0}' does not exist")]
    WorkerNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RouteError {
    /// Transient failures. The caller retries the whole `assign` call with
    /// the same lead id; full rollback means no partial state was left.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouteError::LockTimeout)
    }
}

// SQLITE_BUSY surfaces after the busy handler has already waited out its
// timeout, so it maps to the retryable lock-wait failure rather than a
// storage fault.
impl From<rusqlite::Error> for RouteError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy)
            | Some(rusqlite::ErrorCode::DatabaseLocked) => RouteError::LockTimeout,
            _ => RouteError::Database(e),
        }
    }
}

pub type RouteResult<T> = Result<T, RouteError>;
