use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the importer can observe.
///
/// Asset-level variants ([`Error::Transport`], [`Error::Http`], [`Error::Storage`], ...) never leave the asset processor, they are turned
/// into a failed [`AssetResult`](crate::AssetResult). Only the listing fetch and its shape check surface to the invoker.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level fault (DNS, TLS, reset, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response status.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Malformed structured payload.
    #[error("failed to parse JSON response: {0}")]
    Parse(String),

    /// Blob store write failure.
    #[error("storage error: {cause}")]
    Storage { cause: String },

    /// Listing payload is not a collection of lesson records.
    #[error("invalid response from content API: {0}")]
    InvalidResponse(String),

    /// A lesson or asset record without the expected shape, only fails that lesson or asset.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A lesson slug or asset type that cannot be used as a storage key component.
    #[error("invalid {component} for storage key: {value:?}")]
    InvalidKey { component: &'static str, value: String },

    #[error("invalid URL `{url}`: {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    #[error("config error: {message}")]
    Config { message: String },
}

impl Error {
    pub fn storage(cause: impl std::fmt::Display) -> Self {
        Self::Storage { cause: cause.to_string() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
