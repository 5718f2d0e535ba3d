use thiserror::Error;

/// Failures of a live completion call. None of these reach IPC callers
/// directly; [`super::Generator`] logs them and reports "no result".
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no API credential configured")]
    MissingCredential,

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("response contained no text")]
    EmptyResponse,

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else if e.is_decode() {
            GenerationError::Decode(e.to_string())
        } else {
            GenerationError::Network(e.to_string())
        }
    }
}
