use crate::schema::StatementKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("No period marker found in the {0} document")]
    MissingPeriod(StatementKind),

    #[error("The {0} document contains no line items or totals")]
    EmptyStatement(StatementKind),

    #[error("Malformed {kind} document: {details}")]
    MalformedDocument { kind: StatementKind, details: String },

    #[error("Invalid audit configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Document retrieval failed: {0}")]
    Retrieval(String),

    #[error("Ticket publishing failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "github")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl AuditError {
    /// True for failures that mean a document could not be reduced to a statement.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::MissingPeriod(_) | Self::EmptyStatement(_) | Self::MalformedDocument { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
