#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use mediabridge::{
    config::BridgeConfig,
    daemon::{Daemon, RunOptions},
    model::{ConnectionHealth, DebugState, RecordLevel},
    panel::{PanelId, PanelOutput},
    store::{BridgeStore, DEBUG_KEY},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const STATE_BODY: &str = concat!(
    "event: state\n",
    "data: {\"playerName\":\"mpv\",\"playbackStatus\":\"playing\",",
    "\"title\":\"Parabola\",\"artist\":[\"Tool\"],\"durationUs\":363000000}\n\n",
);

#[derive(Default)]
struct Frames(Mutex<Vec<String>>);

impl PanelOutput for Frames {
    fn present(&self, _id: PanelId, frame: &str) {
        self.0.lock().unwrap().push(frame.to_string());
    }
}

impl Frames {
    fn any(&self, needle: &str) -> bool {
        self.0.lock().unwrap().iter().any(|frame| frame.contains(needle))
    }
}

fn config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.session.enable_mpris = false;
    config.stream.reconnect_delay_ms = 200;
    config.panel.refresh_interval_ms = 50;
    config
}

async fn events_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(STATE_BODY),
        )
        .mount(&server)
        .await;
    server
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn headless_bridge_persists_backend_state() {
    let server = events_server().await;
    let config = config();
    let store = BridgeStore::in_memory(&config.backend.default_base_url);
    let frames = Arc::new(Frames::default());

    let daemon = Daemon::start(
        config,
        store.clone(),
        RunOptions {
            headless: true,
            base_url: Some(server.uri()),
        },
        frames.clone(),
    )
    .await
    .unwrap();

    eventually("a persisted snapshot", || {
        store
            .debug_state()
            .and_then(|debug| debug.last_state)
            .is_some_and(|state| state.title.as_deref() == Some("Parabola"))
    })
    .await;

    let logs = store.logs();
    let messages: Vec<&str> = logs.records().map(|r| r.message.as_str()).collect();
    assert!(messages.contains(&"keepalive context boot completed"));
    assert!(messages.contains(&"SSE connected"));
    assert!(
        messages
            .iter()
            .any(|m| *m == format!("connecting to SSE: {}/events", server.uri()))
    );
    assert!(!frames.any("Media Bridge"));

    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn panel_draws_what_the_keepalive_receives() {
    let server = events_server().await;
    let mut config = config();
    config.panel.open_on_start = true;
    let store = BridgeStore::in_memory(&config.backend.default_base_url);
    let frames = Arc::new(Frames::default());

    let daemon = Daemon::start(
        config,
        store,
        RunOptions {
            headless: false,
            base_url: Some(server.uri()),
        },
        frames.clone(),
    )
    .await
    .unwrap();

    eventually("the panel to show the track", || frames.any("Parabola")).await;
    assert!(frames.any("Media Bridge"));

    let second = daemon.relay().open_panel().await.unwrap();
    assert_eq!(second, PanelId(1));

    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn dropped_stream_reconnects_with_one_warning_per_attempt() {
    use ConnectionHealth::{Connected, Connecting, Error};

    let server = events_server().await;
    let config = config();
    let store = BridgeStore::in_memory(&config.backend.default_base_url);

    let healths: Arc<Mutex<Vec<ConnectionHealth>>> = Arc::default();
    let mut subscription = store.subscribe(DEBUG_KEY).await.unwrap();
    let seen = healths.clone();
    let collector = tokio::spawn(async move {
        while let Some(change) = subscription.recv().await {
            let Some(debug) = change
                .new_value
                .and_then(|value| serde_json::from_value::<DebugState>(value).ok())
            else {
                continue;
            };
            let mut seen = seen.lock().unwrap();
            if seen.last() != Some(&debug.health) {
                seen.push(debug.health);
            }
        }
    });

    let daemon = Daemon::start(
        config,
        store.clone(),
        RunOptions {
            headless: true,
            base_url: Some(server.uri()),
        },
        Arc::new(Frames::default()),
    )
    .await
    .unwrap();

    // Each response ends after one state event, so every connection fails once.
    eventually("a reconnect", || {
        store
            .logs()
            .records()
            .filter(|r| r.message == "SSE connected")
            .count()
            >= 2
    })
    .await;
    daemon.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    collector.abort();

    let healths = healths.lock().unwrap().clone();
    let cycle = [Connecting, Connected, Error, Connecting, Connected];
    assert!(
        healths.windows(cycle.len()).any(|window| window == cycle),
        "unexpected health sequence {healths:?}"
    );

    let failures = healths.iter().filter(|health| **health == Error).count();
    let warnings = store
        .logs()
        .records()
        .filter(|r| r.level == RecordLevel::Warn && r.message.starts_with("SSE error"))
        .count();
    assert!(failures >= 1);
    assert_eq!(warnings, failures);
}

#[tokio::test]
async fn stored_base_url_change_moves_the_stream() {
    let first = events_server().await;
    let second = events_server().await;
    let config = config();
    let store = BridgeStore::in_memory(&config.backend.default_base_url);

    let daemon = Daemon::start(
        config,
        store.clone(),
        RunOptions {
            headless: true,
            base_url: Some(first.uri()),
        },
        Arc::new(Frames::default()),
    )
    .await
    .unwrap();

    eventually("the first stream", || {
        store.logs().records().any(|r| r.message == "SSE connected")
    })
    .await;

    store.set_base_url(&second.uri()).await.unwrap();

    let expected = format!("baseUrl updated: {}", second.uri());
    eventually("the base URL change", || {
        store.logs().records().any(|r| r.message == expected)
    })
    .await;

    let mut reached = false;
    for _ in 0..100 {
        if !second.received_requests().await.unwrap_or_default().is_empty() {
            reached = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(reached, "second backend never saw a connection");

    daemon.shutdown().await.unwrap();
}
