use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::observer::traits::ObserverRing;

/// Observer system errors with structured error types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ObserverError {
    #[error("{0}")]
    ValidationError(String),

    /// Per-field messages; the display form joins them
    #[error("{}", join_messages(.0))]
    FieldErrors(BTreeMap<String, String>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    SecurityError(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("System error: {0}")]
    SystemError(String),
}

fn join_messages(errors: &BTreeMap<String, String>) -> String {
    errors.values().cloned().collect::<Vec<_>>().join(", ")
}

/// Outcome of a completed pipeline run
#[derive(Debug)]
pub struct ObserverResult {
    /// Record as stored after the database ring (the removed record for deletes)
    pub record: serde_json::Value,
    pub execution_time: Duration,
    pub rings_executed: Vec<ObserverRing>,
    /// Detached asynchronous-ring work; callers may await or drop these
    pub background: Vec<tokio::task::JoinHandle<()>>,
}

impl From<DatabaseError> for ObserverError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(msg) => ObserverError::NotFound(msg),
            DatabaseError::Conflict(msg) => ObserverError::Conflict(msg),
            DatabaseError::Filter(err) => ObserverError::ValidationError(err.to_string()),
            other => ObserverError::DatabaseError(other.to_string()),
        }
    }
}
