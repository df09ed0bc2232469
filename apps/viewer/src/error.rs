use gemini_engine::BoxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Unknown app: {0}")]
    UnknownApp(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Digest {key} is not valid UTF-8")]
    InvalidDigest { key: String },

    #[error("Storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("Chat model error: {0}")]
    Llm(#[source] BoxError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
