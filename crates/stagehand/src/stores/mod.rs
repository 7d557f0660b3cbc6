//! Cross-call shared stores.
//!
//! Each store owns its own mutex with short critical sections: copy out,
//! release, work on the copy. Snapshots and macro controllers live for the
//! process; effect-chain templates are written through to disk after every
//! mutation and reloaded at startup; parameter maps are read-only seeds.

pub mod chains;
pub mod macros;
pub mod param_maps;
pub mod snapshots;

use serde::{Deserialize, Serialize};

/// Where a device lives in the session, as the DAW addresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub track_index: i32,
    pub device_index: i32,
}
