use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("missing input: {}", .0.join(", "))]
    MissingInput(Vec<String>),

    #[error("{table} file is missing expected columns: {}", .missing.join(", "))]
    MissingColumns { table: String, missing: Vec<String> },

    #[error("{path} is empty or has no header row")]
    EmptyTable { path: String },

    #[error("row {row} of {table} could not be read: {reason}")]
    InvalidRow {
        table: String,
        row: usize,
        reason: String,
    },

    #[error("appointment {appointment_id} references unknown client {client_id}")]
    UnknownClient {
        client_id: String,
        appointment_id: String,
    },

    #[error("failed to render notification for '{recipient}': {reason}")]
    Render { recipient: String, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ReferralError>;
