//! Mediabridge - desktop media keys for a remote playback backend.
//!
//! The bridge keeps a long-lived connection to an HTTP backend that pushes
//! playback snapshots over server-sent events, mirrors them on the desktop's
//! native media controls, and turns media-key presses back into HTTP control
//! calls. A coordinator owns a headless keepalive context and an optional
//! terminal panel; all of them share state through a persisted store.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mediabridge::{
//!     config::BridgeConfig,
//!     daemon::{Daemon, RunOptions},
//!     panel::TerminalOutput,
//!     store::BridgeStore,
//! };
//!
//! # async fn example() -> mediabridge::Result<()> {
//! let config = BridgeConfig::load()?;
//! let store = BridgeStore::in_memory(&config.backend.default_base_url);
//! let daemon = Daemon::start(config, store, RunOptions::default(), Arc::new(TerminalOutput)).await?;
//! daemon.shutdown().await
//! # }
//! ```

/// HTTP client for the backend's control endpoints.
pub mod backend;

/// Command-line interface.
pub mod cli;

/// Configuration schema and loading.
pub mod config;

/// Per-context bridge state.
pub mod context;

/// Core error types and result aliases.
pub mod core;

/// Long-running bridge process.
pub mod daemon;

/// Keepalive context and its supervisor.
pub mod keepalive;

/// Shared data model.
pub mod model;

/// Terminal panel surface.
pub mod panel;

/// Playback position projection between snapshots.
pub mod projector;

/// Watchable values.
pub mod property;

/// Coordinator and the relay protocol to it.
pub mod relay;

/// Native media session abstraction.
pub mod session;

/// Persisted key/value store.
pub mod store;

/// Server-sent event stream client.
pub mod stream;

/// Tracing subscriber setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{BridgeError, Result};
