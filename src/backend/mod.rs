//! HTTP client for the media-player backend.
//!
//! Control calls are one-shot requests with a per-request timeout. The event
//! stream shares the same connection pool but carries no timeout, since it is
//! expected to stay open indefinitely.

mod error;

pub use error::BackendError;

use std::{fmt, time::Duration};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use crate::model::PlayerSelection;

/// Characters left untouched by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Transport commands accepted by `POST /control/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// Start or resume playback
    Play,
    /// Pause playback
    Pause,
    /// Previous track
    Previous,
    /// Next track
    Next,
    /// Stop playback
    Stop,
}

impl ControlCommand {
    /// Every command, in display order.
    pub const ALL: [ControlCommand; 5] = [
        ControlCommand::Play,
        ControlCommand::Pause,
        ControlCommand::Previous,
        ControlCommand::Next,
        ControlCommand::Stop,
    ];

    /// Path segment used by the backend for this command.
    pub fn as_path(self) -> &'static str {
        match self {
            ControlCommand::Play => "play",
            ControlCommand::Pause => "pause",
            ControlCommand::Previous => "previous",
            ControlCommand::Next => "next",
            ControlCommand::Stop => "stop",
        }
    }

    /// Parses a command name as typed on the command line.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.as_path().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

/// Reply to a `/healthz` probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReply {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

/// Client bound to one backend base URL.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    /// Creates a client with its own connection pool.
    ///
    /// # Errors
    /// Returns `BackendError::InvalidBaseUrl` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        Self::with_http(Client::new(), base_url, timeout)
    }

    /// Creates a client that reuses an existing connection pool.
    ///
    /// # Errors
    /// Returns `BackendError::InvalidBaseUrl` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn with_http(http: Client, base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| BackendError::InvalidBaseUrl {
            url: base_url.to_string(),
            details: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendError::InvalidBaseUrl {
                url: base_url.to_string(),
                details: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            http,
            base_url: trimmed.to_string(),
            timeout,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Underlying HTTP client.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// URL of the server-push endpoint.
    pub fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }

    /// Artwork URL suitable for the native surface.
    pub fn artwork_src(&self, reference: &str) -> String {
        artwork_src(&self.base_url, reference)
    }

    /// Sends a transport command.
    ///
    /// # Errors
    /// Returns error on transport failure or a non-success status.
    pub async fn control(&self, command: ControlCommand) -> Result<(), BackendError> {
        let url = format!("{}/control/{}", self.base_url, command.as_path());
        self.post(&url).await?;
        debug!("sent control action: {command}");
        Ok(())
    }

    /// Seeks to an absolute position. Negative targets are clamped to zero.
    ///
    /// # Errors
    /// Returns error on transport failure or a non-success status.
    pub async fn seek_to(&self, position_us: i64) -> Result<u64, BackendError> {
        let position_us = position_us.max(0).unsigned_abs();
        let url = format!("{}/control/seek?positionUs={position_us}", self.base_url);
        self.post(&url).await?;
        debug!("sent control seekTo: {position_us}us");
        Ok(position_us)
    }

    /// Seeks relative to the current position.
    ///
    /// # Errors
    /// Returns error on transport failure or a non-success status.
    pub async fn seek_by(&self, offset_us: i64) -> Result<(), BackendError> {
        let url = format!("{}/control/seek?offsetUs={offset_us}", self.base_url);
        self.post(&url).await?;
        debug!("sent control seekBy: {offset_us}us");
        Ok(())
    }

    /// Changes which player the backend follows.
    ///
    /// # Errors
    /// Returns error on transport failure or a non-success status.
    pub async fn select_player(&self, selection: &PlayerSelection) -> Result<(), BackendError> {
        let url = format!("{}/player-selection", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(selection)
            .send()
            .await?;
        Self::ensure_success(&url, response).await?;

        debug!(mode = ?selection.mode, "sent player selection");
        Ok(())
    }

    /// Probes `/healthz`.
    ///
    /// # Errors
    /// Returns error on transport failure or a non-success status.
    pub async fn ping(&self) -> Result<PingReply, BackendError> {
        let url = format!("{}/healthz", self.base_url);
        let response = self.http.get(&url).timeout(self.timeout).send().await?;
        let status = response.status().as_u16();
        let body = Self::ensure_success(&url, response).await?;

        Ok(PingReply { status, body })
    }

    async fn post(&self, url: &str) -> Result<String, BackendError> {
        let response = self.http.post(url).timeout(self.timeout).send().await?;
        Self::ensure_success(url, response).await
    }

    async fn ensure_success(url: &str, response: Response) -> Result<String, BackendError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

/// Rewrites an artwork reference for display.
///
/// Absolute http(s) references pass through; every other scheme is routed
/// through the backend's `/art` proxy with the reference as a query parameter.
pub fn artwork_src(base_url: &str, reference: &str) -> String {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return reference.to_string();
    }

    let encoded = utf8_percent_encode(reference, URI_COMPONENT);
    format!("{}/art?src={encoded}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn file_artwork_is_proxied_through_backend() {
        assert_eq!(
            artwork_src("http://host:5000", "file:///music/art.jpg"),
            "http://host:5000/art?src=file%3A%2F%2F%2Fmusic%2Fart.jpg"
        );
    }

    #[test]
    fn http_artwork_passes_through() {
        assert_eq!(artwork_src("http://host", "https://cdn/x.jpg"), "https://cdn/x.jpg");
        assert_eq!(artwork_src("http://host", "HTTP://cdn/x.jpg"), "HTTP://cdn/x.jpg");
    }

    #[test]
    fn unknown_schemes_are_proxied_too() {
        assert_eq!(
            artwork_src("http://host/", "data:image/png;base64,AA=="),
            "http://host/art?src=data%3Aimage%2Fpng%3Bbase64%2CAA%3D%3D"
        );
    }

    #[test]
    fn uri_component_set_keeps_unreserved_marks() {
        assert_eq!(
            artwork_src("http://h", "a-b_c.d!e~f*g'h(i)j k"),
            "http://h/art?src=a-b_c.d!e~f*g'h(i)j%20k"
        );
    }

    #[test]
    fn base_url_is_validated_and_trimmed() {
        let client = BackendClient::new("http://host:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://host:5000");
        assert_eq!(client.events_url(), "http://host:5000/events");

        assert!(matches!(
            BackendClient::new("not a url", Duration::from_secs(1)),
            Err(BackendError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            BackendClient::new("ftp://host", Duration::from_secs(1)),
            Err(BackendError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn control_commands_parse_case_insensitively() {
        assert_eq!(ControlCommand::parse("Next"), Some(ControlCommand::Next));
        assert_eq!(ControlCommand::parse("rewind"), None);
        assert_eq!(ControlCommand::Previous.to_string(), "previous");
    }
}
