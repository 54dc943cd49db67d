use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Query failed for `{expr}`: {reason}")]
    Query { expr: String, reason: String },

    #[error("Unexpected result type: {0}")]
    UnexpectedResultType(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl MeshGraphError {
    pub fn query(expr: impl Into<String>, reason: impl ToString) -> Self {
        Self::Query {
            expr: expr.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MeshGraphError>;
