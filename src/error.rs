use thiserror::Error;

#[derive(Error, Debug)]
pub enum StepwatchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("GitHub API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("GitHub API error (status {status}) after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StepwatchError>;
