//! Client construction errors.

use thiserror::Error;

/// Errors raised while configuring an [`HttpBackend`](crate::HttpBackend).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base URL could not be parsed or cannot carry paths.
    #[error("invalid API base URL '{url}'")]
    InvalidUrl {
        /// Offending input.
        url: String,
        /// Parse failure, when the input was not a URL at all.
        #[source]
        source: Option<url::ParseError>,
    },
    /// The API key contains characters that cannot be sent in a header.
    #[error("API key contains characters that cannot be sent in a header")]
    InvalidApiKey,
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    Build {
        /// Underlying builder failure.
        #[source]
        source: reqwest::Error,
    },
}

/// Convenience alias for client construction results.
pub type ClientResult<T> = Result<T, ClientError>;
