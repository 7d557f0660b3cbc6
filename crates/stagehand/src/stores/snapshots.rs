//! Device parameter snapshots.
//!
//! A snapshot is immutable once created: a captured set of parameter
//! values for one device, restorable as a group. Keyed by caller-assigned
//! ids, process lifetime only.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stageproto::BridgeError;

use super::DeviceRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub device: DeviceRef,
    pub parameters: Vec<ParameterValue>,
}

#[derive(Default)]
pub struct SnapshotStore {
    inner: Mutex<HashMap<String, DeviceSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new snapshot. Ids are caller-assigned and snapshots are
    /// immutable, so a duplicate id is an input error rather than an
    /// overwrite.
    pub fn insert(&self, snapshot: DeviceSnapshot) -> Result<(), BridgeError> {
        let mut map = self.inner.lock().expect("snapshot store poisoned");
        if map.contains_key(&snapshot.id) {
            return Err(BridgeError::invalid_input(
                "snapshot_id",
                format!("snapshot '{}' already exists", snapshot.id),
            ));
        }
        map.insert(snapshot.id.clone(), snapshot);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<DeviceSnapshot> {
        self.inner
            .lock()
            .expect("snapshot store poisoned")
            .get(id)
            .cloned()
    }

    pub fn list(&self) -> Vec<DeviceSnapshot> {
        let mut all: Vec<_> = self
            .inner
            .lock()
            .expect("snapshot store poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str) -> DeviceSnapshot {
        DeviceSnapshot {
            id: id.to_string(),
            created_at: Utc::now(),
            device: DeviceRef {
                track_index: 0,
                device_index: 0,
            },
            parameters: vec![ParameterValue {
                name: "Filter Freq".into(),
                value: 0.4,
            }],
        }
    }

    #[test]
    fn insert_get_list() {
        let store = SnapshotStore::new();
        store.insert(snapshot("warm")).unwrap();
        assert_eq!(store.get("warm").unwrap().parameters.len(), 1);
        assert!(store.get("missing").is_none());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let store = SnapshotStore::new();
        store.insert(snapshot("warm")).unwrap();
        assert!(matches!(
            store.insert(snapshot("warm")),
            Err(BridgeError::InvalidInput { .. })
        ));
    }
}
