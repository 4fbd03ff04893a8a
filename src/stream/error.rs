/// Why one event-stream connection attempt ended.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// The base URL cannot be used
    #[error("invalid events URL: {0}")]
    InvalidUrl(String),

    /// The connection could not be opened
    #[error("SSE error (connect): {0}")]
    Connect(reqwest::Error),

    /// The server answered with a non-success status
    #[error("SSE error (status {status})")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Reading the body failed mid-stream
    #[error("SSE error (read): {0}")]
    Read(reqwest::Error),

    /// The server sent a line longer than the decoder accepts
    #[error("SSE error ({0})")]
    LineTooLong(#[from] super::sse::LineTooLong),

    /// The server closed the stream
    #[error("SSE error (closed by server)")]
    Closed,
}
