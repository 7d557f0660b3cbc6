//! Macro controllers.
//!
//! A macro maps one 0..1 input onto many device parameters, each through
//! its own output range and curve. Applying a macro is pure computation
//! here; the handler fans the results out over the realtime channel.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use stageproto::BridgeError;

use super::DeviceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    Linear,
    Exponential,
    Logarithmic,
}

impl Curve {
    /// Shape a 0..1 input before range mapping.
    pub fn shape(self, input: f64) -> f64 {
        let x = input.clamp(0.0, 1.0);
        match self {
            Curve::Linear => x,
            Curve::Exponential => x * x,
            Curve::Logarithmic => x.sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroBinding {
    pub device: DeviceRef,
    pub parameter_index: i32,
    pub parameter_name: String,
    pub min_out: f64,
    pub max_out: f64,
    pub curve: Curve,
}

impl MacroBinding {
    pub fn output_for(&self, input: f64) -> f64 {
        let shaped = self.curve.shape(input);
        self.min_out + (self.max_out - self.min_out) * shaped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroController {
    pub id: String,
    pub bindings: Vec<MacroBinding>,
}

#[derive(Default)]
pub struct MacroStore {
    inner: Mutex<HashMap<String, MacroController>>,
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; macros are mutable via update, unlike snapshots.
    pub fn upsert(&self, controller: MacroController) {
        self.inner
            .lock()
            .expect("macro store poisoned")
            .insert(controller.id.clone(), controller);
    }

    pub fn get(&self, id: &str) -> Result<MacroController, BridgeError> {
        self.inner
            .lock()
            .expect("macro store poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| {
                BridgeError::invalid_input("macro_id", format!("no macro controller '{}'", id))
            })
    }

    pub fn list(&self) -> Vec<MacroController> {
        let mut all: Vec<_> = self
            .inner
            .lock()
            .expect("macro store poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}
