//! Parameter maps: friendly names for device parameters.
//!
//! Read-only lookups keyed by device kind, seeded at startup. The mutex is
//! only here to share the store across handler tasks; nothing mutates it
//! after seeding.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamMapping {
    pub original_name: String,
    pub friendly_name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMap {
    pub id: String,
    pub device_kind: String,
    pub mappings: Vec<ParamMapping>,
}

pub struct ParamMapStore {
    inner: Mutex<HashMap<String, ParameterMap>>,
}

impl ParamMapStore {
    /// Seed with the built-in maps for common stock devices.
    pub fn with_builtins() -> Self {
        let store = Self {
            inner: Mutex::new(HashMap::new()),
        };
        for map in builtin_maps() {
            store
                .inner
                .lock()
                .expect("param map store poisoned")
                .insert(map.device_kind.clone(), map);
        }
        store
    }

    pub fn get(&self, device_kind: &str) -> Option<ParameterMap> {
        self.inner
            .lock()
            .expect("param map store poisoned")
            .get(&device_kind.to_lowercase())
            .cloned()
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self
            .inner
            .lock()
            .expect("param map store poisoned")
            .keys()
            .cloned()
            .collect();
        kinds.sort();
        kinds
    }
}

fn mapping(original: &str, friendly: &str, category: &str) -> ParamMapping {
    ParamMapping {
        original_name: original.to_string(),
        friendly_name: friendly.to_string(),
        category: category.to_string(),
    }
}

fn builtin_maps() -> Vec<ParameterMap> {
    vec![
        ParameterMap {
            id: "wavetable-core".into(),
            device_kind: "wavetable".into(),
            mappings: vec![
                mapping("Osc 1 Transp", "Oscillator 1 Transpose", "oscillator"),
                mapping("Osc 1 Pos", "Wavetable Position", "oscillator"),
                mapping("Filter 1 Freq", "Filter Cutoff", "filter"),
                mapping("Filter 1 Res", "Filter Resonance", "filter"),
                mapping("Amp Attack", "Amp Attack", "envelope"),
                mapping("Amp Release", "Amp Release", "envelope"),
            ],
        },
        ParameterMap {
            id: "operator-core".into(),
            device_kind: "operator".into(),
            mappings: vec![
                mapping("Ae Attack", "Envelope Attack", "envelope"),
                mapping("Ae Release", "Envelope Release", "envelope"),
                mapping("Filter Freq", "Filter Cutoff", "filter"),
                mapping("Tone", "Tone", "global"),
            ],
        },
        ParameterMap {
            id: "compressor-core".into(),
            device_kind: "compressor".into(),
            mappings: vec![
                mapping("Threshold", "Threshold", "dynamics"),
                mapping("Ratio", "Ratio", "dynamics"),
                mapping("Attack", "Attack", "timing"),
                mapping("Release", "Release", "timing"),
                mapping("Gain", "Makeup Gain", "output"),
            ],
        },
    ]
}
