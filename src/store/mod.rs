//! Persisted bridge store with change notifications.
//!
//! The store is the only durable state in the bridge. Every context reads and
//! writes `baseUrl`, `bridgeDebug` and `bridgeLogs` through it (directly, or via
//! the coordinator relay) and reconciles its caches from change notifications.

mod broadcast;
mod changes;
mod diff;
mod file_watcher;
mod file_watching;
mod key_ops;
mod persisted;

#[cfg(test)]
mod tests;

pub use broadcast::Subscription;
pub use changes::{ChangeSource, StorageChange, StoreError};
pub use persisted::{BASE_URL_KEY, BridgeStore, DEBUG_KEY, LOGS_KEY, StorageSnapshot};
