use thiserror::Error;

/// Failure fetching or decoding a feed. Never fatal: callers keep their
/// previous data and surface a notice.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("document encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid collection path: {0:?}")]
    InvalidPath(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Top level error for the binary.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("invalid listen host {0:?}")]
    Host(String),

    #[error("could not bind {host} on ports {first}..={last}")]
    Bind { host: String, first: u16, last: u16 },
}

pub type Result<T> = std::result::Result<T, Error>;
