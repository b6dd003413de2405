use std::collections::TryReserveError;
use std::path::PathBuf;

use crate::data_type::DataType;
use crate::statement::StatementState;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the marshaling layer and its collaborators.
///
/// Nothing is retried internally; see [Error::kind] to tell runtime
/// conditions apart from programmer errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("open failed for '{}': {source}", .path.display())]
    ConnectionOpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("prepare failed for `{sql}`: {source}")]
    StatementPrepareFailed {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{operation} failed: {source}")]
    StatementExecuteFailed {
        operation: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: DataType, found: DataType },

    #[error("column '{column}' has unsupported declared type {}", .declared.as_deref().unwrap_or("<none>"))]
    UnsupportedDeclaredType {
        column: String,
        declared: Option<String>,
    },

    #[error("column '{column}' is declared {declared} but holds an undecodable {found} value")]
    Decode {
        column: String,
        declared: DataType,
        found: DataType,
    },

    #[error("could not grow table to {requested_rows} rows: {source}")]
    AllocationFailed {
        requested_rows: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("row has {found} values, table has {expected} columns")]
    RowLengthMismatch { expected: usize, found: usize },

    #[error("statement takes {expected} parameters, {found} given")]
    ParameterCount { expected: usize, found: usize },

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("table '{table}' declares a composite primary key ({})", .columns.join(", "))]
    CompositePrimaryKey { table: String, columns: Vec<String> },

    #[error("table '{table}' has no columns")]
    EmptySchema { table: String },

    #[error("cannot {operation} a statement in state {state:?}")]
    StatementMisuse {
        operation: &'static str,
        state: StatementState,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Coarse classification of an [Error].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectionOpenFailed,
    StatementPrepareFailed,
    StatementExecuteFailed,
    TypeMismatch,
    AllocationFailed,
    InvalidArgument,
    Misuse,
    Settings,
}

impl ErrorKind {
    /// Programmer errors come from wrong use of the API or from generated
    /// SQL the store rejects; the rest are runtime conditions for the caller
    /// to handle.
    pub fn is_programmer_error(self) -> bool {
        matches!(
            self,
            Self::StatementPrepareFailed | Self::TypeMismatch | Self::InvalidArgument | Self::Misuse
        )
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionOpenFailed { .. } => ErrorKind::ConnectionOpenFailed,
            Self::StatementPrepareFailed { .. } => ErrorKind::StatementPrepareFailed,
            Self::StatementExecuteFailed { .. } => ErrorKind::StatementExecuteFailed,
            Self::TypeMismatch { .. } | Self::UnsupportedDeclaredType { .. } | Self::Decode { .. } => {
                ErrorKind::TypeMismatch
            }
            Self::AllocationFailed { .. } => ErrorKind::AllocationFailed,
            Self::RowLengthMismatch { .. }
            | Self::ParameterCount { .. }
            | Self::InvalidIdentifier(_)
            | Self::CompositePrimaryKey { .. }
            | Self::EmptySchema { .. } => ErrorKind::InvalidArgument,
            Self::StatementMisuse { .. } => ErrorKind::Misuse,
            Self::Json(_) | Self::InvalidSetting(_) => ErrorKind::Settings,
        }
    }

    /// Wraps a store error raised while running `operation`.
    pub(crate) fn execute(operation: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::StatementExecuteFailed {
            operation: operation.into(),
            source,
        }
    }

    /// The underlying SQLite error code, when the error came from the store.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Self::ConnectionOpenFailed { source, .. }
            | Self::StatementPrepareFailed { source, .. }
            | Self::StatementExecuteFailed { source, .. } => source.sqlite_error_code(),
            _ => None,
        }
    }
}
