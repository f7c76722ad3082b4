use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("http {status}: {url}")]
    Http { status: u16, url: String },

    #[error("circuit open for {host}, retry in {remaining_secs}s")]
    CircuitOpen { host: String, remaining_secs: u64 },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown OParl type: {0}")]
    UnknownType(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    /// Whether a failed HTTP attempt is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Network(_) | IngestError::Timeout(_) => true,
            IngestError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
