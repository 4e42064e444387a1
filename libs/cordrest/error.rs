use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Rate limited, request not sent")]
    RateLimited,

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::DeserializeFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RestError>;
