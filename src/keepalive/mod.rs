//! The keepalive context and its single-flight supervisor.
//!
//! The keepalive context holds an audio session open so the desktop keeps
//! routing media keys to the bridge, and runs the event stream that feeds the
//! native surface. The coordinator owns its lifecycle through a
//! [`KeepaliveSupervisor`], which coalesces concurrent ensure requests.

pub mod audio;
mod context;
mod host;

pub use context::{KeepaliveContext, KeepaliveOptions};
pub use host::TaskKeepaliveHost;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tracing::{debug, info};

use crate::relay::RelayHandle;

/// Errors raised while creating or running the keepalive context.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeepaliveError {
    /// A keepalive context already exists
    #[error("keepalive context already exists")]
    AlreadyExists,

    /// The host failed to create the context
    #[error("failed to create keepalive context: {0}")]
    CreateFailed(String),

    /// Audio output cannot be used
    #[error("keepalive audio unavailable: {0}")]
    AudioUnavailable(String),

    /// Playing the keepalive buffer failed
    #[error("keepalive audio playback failed: {0}")]
    Playback(String),
}

impl KeepaliveError {
    /// Whether the error only says that the context exists already.
    ///
    /// Hosts that cannot report the condition structurally surface it as a
    /// creation failure whose message says so.
    pub fn is_duplicate(&self) -> bool {
        match self {
            KeepaliveError::AlreadyExists => true,
            KeepaliveError::CreateFailed(message) => {
                message.to_ascii_lowercase().contains("already exists")
            }
            _ => false,
        }
    }
}

/// Creates and probes keepalive contexts.
#[async_trait]
pub trait KeepaliveHost: Send + Sync {
    /// Whether a keepalive context currently exists.
    async fn exists(&self) -> bool;

    /// Creates the keepalive context.
    ///
    /// # Errors
    /// Returns `KeepaliveError::AlreadyExists` if one exists, or
    /// `KeepaliveError::CreateFailed` if creation fails.
    async fn create(&self, relay: RelayHandle) -> Result<(), KeepaliveError>;

    /// Tears down the keepalive context, if any, and waits for it to finish.
    async fn close(&self);
}

type EnsureFuture = Shared<BoxFuture<'static, Result<(), KeepaliveError>>>;

/// Idempotent, concurrency-safe creation of the keepalive context.
///
/// Concurrent [`ensure`](Self::ensure) calls share one in-flight operation;
/// only the first caller starts it. Cheap to clone.
#[derive(Clone)]
pub struct KeepaliveSupervisor {
    host: Arc<dyn KeepaliveHost>,
    relay: RelayHandle,
    in_flight: Arc<Mutex<Option<EnsureFuture>>>,
}

impl KeepaliveSupervisor {
    /// Supervisor creating contexts through `host`; created contexts talk back
    /// through `relay`.
    pub fn new(host: Arc<dyn KeepaliveHost>, relay: RelayHandle) -> Self {
        Self {
            host,
            relay,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Host used by this supervisor.
    pub fn host(&self) -> &Arc<dyn KeepaliveHost> {
        &self.host
    }

    /// Makes sure the keepalive context exists.
    ///
    /// No-op when it already exists. A duplicate-creation race counts as
    /// success.
    ///
    /// # Errors
    /// Returns the host's creation error; every caller sharing the attempt
    /// observes the same result.
    pub async fn ensure(&self) -> Result<(), KeepaliveError> {
        let attempt = {
            let mut slot = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match slot.as_ref() {
                Some(attempt) => {
                    debug!("joining in-flight keepalive ensure");
                    attempt.clone()
                }
                None => {
                    let attempt = self.start_attempt();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Forgets the in-flight attempt, if any, so that a dropped attempt is
    /// never resumed by a later [`ensure`](Self::ensure).
    pub fn cancel(&self) {
        if self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("in-flight keepalive ensure cancelled");
        }
    }

    fn start_attempt(&self) -> EnsureFuture {
        let host = self.host.clone();
        let relay = self.relay.clone();
        let in_flight = self.in_flight.clone();

        async move {
            let result = if host.exists().await {
                Ok(())
            } else {
                match host.create(relay).await {
                    Ok(()) => {
                        info!("keepalive context created");
                        Ok(())
                    }
                    Err(e) if e.is_duplicate() => {
                        debug!("keepalive context appeared concurrently");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            };

            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();

            result
        }
        .boxed()
        .shared()
    }
}
