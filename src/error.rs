use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayslipError {
    #[error("Missing or invalid input: {0}")]
    Validation(String),

    #[error("Invalid or expired API token: {0}")]
    InvalidCredential(String),

    #[error("Upstream API error (status {status}) while {context}")]
    Upstream { status: u16, context: String },

    #[error("Malformed PDF document: {0}")]
    MalformedDocument(String),

    #[error("Document has {available} page(s), page index {requested} is unavailable")]
    NotEnoughPages { requested: u32, available: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, PayslipError>;
