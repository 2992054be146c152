use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid order specification: {0}")]
    InvalidOrder(String),

    #[error("Invalid sort direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid filter clause: {0}")]
    InvalidFilter(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid attribute path: {0}")]
    InvalidAttributePath(String),

    #[error("Request exceeds limit: {0}")]
    LimitExceeded(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
