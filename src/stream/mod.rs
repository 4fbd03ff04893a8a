//! Server-push connection to the backend.
//!
//! [`EventStreamClient`] keeps one `GET {base}/events` connection alive and
//! reports what happens on it as [`StreamEvent`]s. Any failure, including the
//! server closing the stream, schedules a reconnect after a fixed delay,
//! forever.

mod error;
pub mod sse;

pub use error::StreamError;

use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::{Client, Response, header::ACCEPT};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, instrument};
use url::Url;

use crate::model::PlaybackSnapshot;
use sse::{SseDecoder, SseEvent};

/// Name of the server-sent event carrying a snapshot.
pub const STATE_EVENT: &str = "state";

const EVENT_CAPACITY: usize = 64;

/// What happened on the event stream.
#[derive(Debug)]
pub enum StreamEvent {
    /// A connection attempt started
    Connecting {
        /// URL being connected to
        url: String,
    },
    /// The server accepted the stream
    Connected,
    /// A `state` event carried a snapshot
    Snapshot(Box<PlaybackSnapshot>),
    /// A `state` event carried something that is not a snapshot
    Malformed {
        /// Parser error
        details: String,
    },
    /// The attempt ended; a reconnect follows after the delay
    Failed(StreamError),
}

/// Maintains a single live event-stream connection.
///
/// Dropping the client closes the connection and cancels any pending
/// reconnect.
#[derive(Debug)]
pub struct EventStreamClient {
    http: Client,
    reconnect_delay: Duration,
    events_tx: mpsc::Sender<StreamEvent>,
    task: Option<JoinHandle<()>>,
}

impl EventStreamClient {
    /// Creates an idle client and the receiver its events are delivered to.
    pub fn new(http: Client, reconnect_delay: Duration) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);

        (
            Self {
                http,
                reconnect_delay,
                events_tx,
                task: None,
            },
            events_rx,
        )
    }

    /// (Re)connects to `base_url`, closing any previous connection first.
    ///
    /// The new attempt starts immediately, bypassing the reconnect delay.
    #[instrument(skip(self))]
    pub fn connect(&mut self, base_url: &str) {
        self.close();

        let http = self.http.clone();
        let delay = self.reconnect_delay;
        let events_tx = self.events_tx.clone();
        let base_url = base_url.trim_end_matches('/').to_string();

        self.task = Some(tokio::spawn(run_connection_loop(
            http, base_url, delay, events_tx,
        )));
    }

    /// Closes the connection and cancels any pending reconnect.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("event stream closed");
        }
    }

    /// Whether a connection loop is active.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection_loop(
    http: Client,
    base_url: String,
    delay: Duration,
    events_tx: mpsc::Sender<StreamEvent>,
) {
    let url = format!("{base_url}/events");

    loop {
        let connecting = StreamEvent::Connecting { url: url.clone() };
        if events_tx.send(connecting).await.is_err() {
            return;
        }

        let error = connect_once(&http, &url, &events_tx).await;
        if events_tx.send(StreamEvent::Failed(error)).await.is_err() {
            return;
        }

        tokio::time::sleep(delay).await;
    }
}

async fn connect_once(
    http: &Client,
    url: &str,
    events_tx: &mpsc::Sender<StreamEvent>,
) -> StreamError {
    if let Err(e) = Url::parse(url) {
        return StreamError::InvalidUrl(format!("{url}: {e}"));
    }

    let response = match http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return StreamError::Connect(e),
    };

    let status = response.status();
    if !status.is_success() {
        return StreamError::Status {
            status: status.as_u16(),
        };
    }

    if events_tx.send(StreamEvent::Connected).await.is_err() {
        return StreamError::Closed;
    }

    let events = sse_events(response);
    tokio::pin!(events);

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => return e,
        };

        if event.event != STATE_EVENT {
            debug!(event = %event.event, "ignoring event");
            continue;
        }

        let message = match serde_json::from_str::<PlaybackSnapshot>(&event.data) {
            Ok(snapshot) => StreamEvent::Snapshot(Box::new(snapshot)),
            Err(e) => StreamEvent::Malformed {
                details: e.to_string(),
            },
        };

        if events_tx.send(message).await.is_err() {
            return StreamError::Closed;
        }
    }

    StreamError::Closed
}

fn sse_events(response: Response) -> impl Stream<Item = Result<SseEvent, StreamError>> {
    async_stream::stream! {
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => match decoder.feed(&chunk) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        yield Err(StreamError::from(e));
                        return;
                    }
                },
                Err(e) => {
                    yield Err(StreamError::Read(e));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[tokio::test]
    async fn unreachable_backend_reports_connecting_then_failure() {
        let (mut client, mut events) =
            EventStreamClient::new(Client::new(), Duration::from_millis(10));
        client.connect("http://127.0.0.1:9/");

        match events.recv().await.unwrap() {
            StreamEvent::Connecting { url } => assert_eq!(url, "http://127.0.0.1:9/events"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            events.recv().await.unwrap(),
            StreamEvent::Failed(StreamError::Connect(_))
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            StreamEvent::Connecting { .. }
        ));
    }

    #[tokio::test]
    async fn invalid_base_url_keeps_retrying() {
        let (mut client, mut events) =
            EventStreamClient::new(Client::new(), Duration::from_millis(1));
        client.connect("not a url");

        for _ in 0..2 {
            assert!(matches!(
                events.recv().await.unwrap(),
                StreamEvent::Connecting { .. }
            ));
            assert!(matches!(
                events.recv().await.unwrap(),
                StreamEvent::Failed(StreamError::InvalidUrl(_))
            ));
        }
    }

    #[tokio::test]
    async fn close_stops_the_loop() {
        let (mut client, mut events) =
            EventStreamClient::new(Client::new(), Duration::from_secs(60));
        client.connect("not a url");
        events.recv().await.unwrap();
        events.recv().await.unwrap();

        client.close();
        assert!(!client.is_running());
    }
}
