use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tracing::{info, warn};

use super::{KeepaliveContext, KeepaliveError, KeepaliveHost, KeepaliveOptions};
use crate::relay::RelayHandle;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Runs the keepalive context as a tokio task.
pub struct TaskKeepaliveHost {
    options: KeepaliveOptions,
    running: Mutex<Option<Running>>,
}

impl TaskKeepaliveHost {
    /// Host that boots contexts with `options`.
    pub fn new(options: KeepaliveOptions) -> Self {
        Self {
            options,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl KeepaliveHost for TaskKeepaliveHost {
    async fn exists(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    async fn create(&self, relay: RelayHandle) -> Result<(), KeepaliveError> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return Err(KeepaliveError::AlreadyExists);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let context = KeepaliveContext::new(relay, self.options.clone());
        let task = tokio::spawn(context.run(shutdown_rx));

        *running = Some(Running { shutdown, task });
        Ok(())
    }

    async fn close(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        let _ = running.shutdown.send(true);
        let abort = running.task.abort_handle();

        match tokio::time::timeout(CLOSE_TIMEOUT, running.task).await {
            Ok(_) => info!("keepalive context closed"),
            Err(_) => {
                warn!("keepalive context did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}
