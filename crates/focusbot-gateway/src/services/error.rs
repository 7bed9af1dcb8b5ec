use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no progress data yet")]
    NoData,

    #[error("configuration error: {0}")]
    Configuration(String),
}
