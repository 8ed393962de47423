//! Error types for mydml

use crate::driver::ExecResult;
use thiserror::Error;

/// Result type alias for mydml operations
pub type DmlResult<T> = Result<T, DmlError>;

/// Error types for statement building and execution
#[derive(Debug, Clone, Error)]
pub enum DmlError {
    /// Required input is missing (table name, columns, values, records)
    #[error("Empty input: {0}")]
    Empty(String),

    /// Argument count does not match placeholder count, or two lists differ in length
    #[error("Mismatch: {0}")]
    Mismatch(String),

    /// A construct the builder cannot express
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A value could not be encoded for interpolation. Raised by
    /// [`DriverValue`](crate::arg::DriverValue) implementations; invalid
    /// UTF-8 in byte arguments is not an error and renders as a hex literal.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Error reported by the driver collaborator (exec, prepare, transaction)
    #[error("Driver error: {0}")]
    Driver(String),

    /// The driver gave up after the timeout carried in the execution context
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// A bulk execution failed at one record.
    ///
    /// `completed` holds `(record index, result)` for every record that
    /// reached the database successfully, including records running
    /// concurrently with the failing one. It is always empty when the run
    /// was transactional.
    #[error("record {index}: {source}")]
    Record {
        index: usize,
        completed: Vec<(usize, ExecResult)>,
        #[source]
        source: Box<DmlError>,
    },

    /// Rolling back a transaction failed after another error.
    #[error("rollback failed: {rollback}; original error: {original}")]
    Rollback {
        rollback: Box<DmlError>,
        #[source]
        original: Box<DmlError>,
    },
}

impl DmlError {
    /// Create an empty-input error
    pub fn empty(message: impl Into<String>) -> Self {
        Self::Empty(message.into())
    }

    /// Create a mismatch error
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::Mismatch(message.into())
    }

    /// Create a not-supported error
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Check if this is an empty-input error
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    /// Check if this is a mismatch error
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch(_))
    }

    /// Check if this is a not-supported error
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }

    /// Check if this is an encoding error
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Index of the failing record of a bulk execution, looking through a
    /// rollback failure.
    pub fn record_index(&self) -> Option<usize> {
        match self {
            Self::Record { index, .. } => Some(*index),
            Self::Rollback { original, .. } => original.record_index(),
            _ => None,
        }
    }

    /// Results, keyed by record index, of the records a failed
    /// non-transactional bulk run executed.
    pub fn completed(&self) -> &[(usize, ExecResult)] {
        match self {
            Self::Record { completed, .. } => completed,
            _ => &[],
        }
    }

    /// Prefix the message with the operation that failed, keeping the kind.
    pub(crate) fn context(self, what: &str) -> Self {
        match self {
            Self::Empty(m) => Self::Empty(format!("{what}: {m}")),
            Self::Mismatch(m) => Self::Mismatch(format!("{what}: {m}")),
            Self::NotSupported(m) => Self::NotSupported(format!("{what}: {m}")),
            Self::Encoding(m) => Self::Encoding(format!("{what}: {m}")),
            Self::Driver(m) => Self::Driver(format!("{what}: {m}")),
            other => other,
        }
    }
}
