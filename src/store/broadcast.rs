use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    task::JoinHandle,
};
use tracing::debug;

use super::{StorageChange, StoreError, key_ops::key_matches};

const SUBSCRIBER_CAPACITY: usize = 256;

/// Commands sent to the broadcast actor task
enum BroadcastCommand {
    Subscribe {
        id: usize,
        pattern: String,
        sender: Sender<StorageChange>,
    },
    Unsubscribe {
        id: usize,
    },
    Broadcast(Vec<StorageChange>),
}

struct ActorSubscription {
    id: usize,
    pattern: String,
    sender: Sender<StorageChange>,
}

/// A subscription handle that automatically cleans up when dropped.
pub struct Subscription {
    id: usize,
    service: BroadcastService,
    receiver: Receiver<StorageChange>,
}

/// Handle to the storage-change broadcast actor.
///
/// A dedicated task owns all subscriber state and processes commands
/// sequentially, so changes reach every subscriber in write order.
#[derive(Clone)]
pub(super) struct BroadcastService {
    command_tx: Sender<BroadcastCommand>,
    next_id: Arc<AtomicUsize>,
    _handle: Arc<JoinHandle<()>>,
}

impl BroadcastService {
    /// Creates a new broadcast service with its own actor task.
    pub(super) fn new() -> Self {
        let (command_tx, mut command_rx) = mpsc::channel(100);

        let handle = tokio::spawn(async move {
            broadcast_actor_loop(&mut command_rx).await;
        });

        Self {
            command_tx,
            next_id: Arc::new(AtomicUsize::new(1)),
            _handle: Arc::new(handle),
        }
    }

    /// Subscribes to changes whose key matches `pattern`.
    ///
    /// # Errors
    /// Returns `StoreError::ServiceUnavailable` if the actor is not running.
    pub(super) async fn subscribe(&self, pattern: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.command_tx
            .send(BroadcastCommand::Subscribe {
                id,
                pattern: pattern.to_string(),
                sender: tx,
            })
            .await
            .map_err(|_| unavailable())?;

        Ok(Subscription {
            id,
            service: self.clone(),
            receiver: rx,
        })
    }

    /// Delivers a batch of changes to every matching subscriber.
    ///
    /// # Errors
    /// Returns `StoreError::ServiceUnavailable` if the actor is not running.
    pub(super) async fn broadcast(&self, changes: Vec<StorageChange>) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        self.command_tx
            .send(BroadcastCommand::Broadcast(changes))
            .await
            .map_err(|_| unavailable())
    }
}

fn unavailable() -> StoreError {
    StoreError::ServiceUnavailable {
        service: "broadcast".to_string(),
        details: "Broadcast service is not running".to_string(),
    }
}

impl Subscription {
    /// Get a mutable reference to the receiver for storage changes.
    pub fn receiver_mut(&mut self) -> &mut Receiver<StorageChange> {
        &mut self.receiver
    }

    /// Waits for the next matching change.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn recv(&mut self) -> Option<StorageChange> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self
            .service
            .command_tx
            .try_send(BroadcastCommand::Unsubscribe { id: self.id });
    }
}

async fn broadcast_actor_loop(command_rx: &mut Receiver<BroadcastCommand>) {
    let mut subscriptions: Vec<ActorSubscription> = Vec::new();

    while let Some(command) = command_rx.recv().await {
        match command {
            BroadcastCommand::Subscribe {
                id,
                pattern,
                sender,
            } => {
                subscriptions.push(ActorSubscription {
                    id,
                    pattern,
                    sender,
                });
            }

            BroadcastCommand::Unsubscribe { id } => {
                subscriptions.retain(|sub| sub.id != id);
            }

            BroadcastCommand::Broadcast(changes) => {
                for change in changes {
                    subscriptions.retain(|sub| {
                        if !key_matches(&change.key, &sub.pattern) {
                            return true;
                        }

                        match sub.sender.try_send(change.clone()) {
                            Ok(()) => true,
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                debug!(subscriber = sub.id, "subscriber lagging, change dropped");
                                true
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => false,
                        }
                    });
                }
            }
        }
    }
}
