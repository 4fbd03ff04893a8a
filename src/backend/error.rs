/// Errors returned by backend HTTP calls.
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    /// The configured base URL is not a usable absolute URL
    #[error("invalid backend base URL '{url}': {details}")]
    InvalidBaseUrl {
        /// The rejected URL
        url: String,
        /// Parser error details
        details: String,
    },

    /// Transport-level failure (connect, timeout, body read)
    #[error("request to backend failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },
}
