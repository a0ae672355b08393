use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} rejected with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
