use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Unknown venue: '{0}'")]
    UnknownVenue(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Venue error ({code}): {message}")]
    Venue { code: i64, message: String },
}
