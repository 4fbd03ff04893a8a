use std::{collections::BTreeSet, time::Instant};

use serde_json::{Map, Value};

use super::{ChangeSource, StorageChange};

/// Compares two store snapshots key by key.
///
/// Keys are visited in sorted order so callers observe a stable change order.
/// Only keys whose value differs produce a change; removed keys yield a change
/// with `new_value: None`.
pub(super) fn diff_maps(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    source: ChangeSource,
) -> Vec<StorageChange> {
    let timestamp = Instant::now();
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let old_value = old.get(key);
            let new_value = new.get(key);

            if old_value == new_value {
                return None;
            }

            Some(StorageChange {
                key: key.clone(),
                old_value: old_value.cloned(),
                new_value: new_value.cloned(),
                timestamp,
                source,
            })
        })
        .collect()
}
