use thiserror::Error;

use crate::filter::FilterError;

/// Failures raised by a `Queryable` while compiling or executing
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Column '{column}' does not belong to table '{table}'")]
    ForeignColumn { column: String, table: String },

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
