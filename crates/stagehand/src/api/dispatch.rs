//! The tool dispatcher.
//!
//! Per call: log the start, enforce input size caps, precheck the tool's
//! declared needs, run the handler on the worker pool (a panicking handler
//! becomes `Internal` and takes nothing else down), wrap the outcome in
//! the uniform envelope, and record duration and outcome.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use stageproto::BridgeError;

use crate::api::call_log::{summarize_args, CallRecord};
use crate::api::{responses, ToolRegistry, ToolSpec};
use crate::state::AppState;

/// Input size caps enforced before any I/O.
const MAX_NOTES: usize = 10_000;
const MAX_AUTOMATION_POINTS: usize = 500;
const MAX_BATCH_PARAMS: usize = 200;
const MAX_QUERY_CHARS: usize = 500;

/// Grace period for a DAW that is still coming up when the first tool
/// call arrives.
const DAW_PRECHECK_WAIT: Duration = Duration::from_secs(2);

pub struct Dispatcher {
    state: Arc<AppState>,
    registry: ToolRegistry,
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>, registry: ToolRegistry) -> Arc<Self> {
        state.tool_count.store(registry.len(), Ordering::Relaxed);
        Arc::new(Self { state, registry })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Route one tool invocation and return the response envelope.
    pub async fn dispatch(&self, name: &str, args: Value) -> Value {
        let started = Instant::now();
        let args_summary = summarize_args(&args);
        info!(tool = %name, args = %args_summary, "tool call");

        let Some(spec) = self.registry.get(name) else {
            let err = BridgeError::invalid_input("tool", format!("unknown tool '{}'", name));
            let envelope = responses::error("Tool call failed", &err);
            self.record(name, &args_summary, started, err.kind());
            return envelope;
        };

        let outcome = self.run(spec, args).await;
        let (envelope, outcome_label) = match &outcome {
            Ok(output) => (
                responses::ok(output.message.clone(), output.data.clone()),
                "ok",
            ),
            Err(e) => {
                if let BridgeError::Internal(detail) = e {
                    error!(tool = %name, detail, "handler failed internally");
                } else {
                    warn!(tool = %name, error = %e, "tool call failed");
                }
                (responses::error(spec.error_prefix, e), e.kind())
            }
        };

        self.record(name, &args_summary, started, outcome_label);
        envelope
    }

    async fn run(
        &self,
        spec: &ToolSpec,
        args: Value,
    ) -> Result<crate::api::ToolOutput, BridgeError> {
        validate_size_caps(&args)?;

        if spec.needs.daw && !self.state.daw_connected.wait_timeout(DAW_PRECHECK_WAIT).await {
            return Err(BridgeError::NotReady("DAW connection"));
        }
        if spec.needs.bridge {
            match self.state.bridge.ping().await {
                // A busy bridge is a reachable bridge; the handler forwards
                // its request and surfaces the device's own response.
                Ok(_) | Err(BridgeError::BridgeBusy { .. }) => {}
                Err(_) => return Err(BridgeError::NotReady("OSC bridge")),
            }
        }
        if spec.needs.catalog && !self.state.catalog_populated.is_set() {
            // Never NotReady: the resolver owns the bounded wait and falls
            // back to name pass-through on a cold catalog.
            debug!(tool = spec.name, "catalog not populated; names will pass through");
        }

        let handler = Arc::clone(&spec.handler);
        let state = Arc::clone(&self.state);
        match tokio::spawn(async move { handler(state, args).await }).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(BridgeError::Internal(format!("handler panicked: {}", join_err)))
            }
            Err(join_err) => Err(BridgeError::Internal(format!(
                "handler task failed: {}",
                join_err
            ))),
        }
    }

    fn record(&self, tool: &str, args_summary: &str, started: Instant, outcome: &str) {
        self.state.call_log.record(CallRecord {
            timestamp: Utc::now(),
            tool: tool.to_string(),
            args_summary: args_summary.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            outcome: outcome.to_string(),
        });
    }
}

/// Reject oversized inputs before they reach a transport.
fn validate_size_caps(args: &Value) -> Result<(), BridgeError> {
    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(notes) = obj.get("notes").and_then(Value::as_array) {
        if notes.len() > MAX_NOTES {
            return Err(BridgeError::invalid_input(
                "notes",
                format!("{} notes exceeds the cap of {}", notes.len(), MAX_NOTES),
            ));
        }
    }
    if let Some(points) = obj.get("points").and_then(Value::as_array) {
        if points.len() > MAX_AUTOMATION_POINTS {
            return Err(BridgeError::invalid_input(
                "points",
                format!(
                    "{} automation points exceeds the cap of {}",
                    points.len(),
                    MAX_AUTOMATION_POINTS
                ),
            ));
        }
    }
    if let Some(params) = obj.get("parameters").and_then(Value::as_array) {
        if params.len() > MAX_BATCH_PARAMS {
            return Err(BridgeError::invalid_input(
                "parameters",
                format!(
                    "{} parameters exceeds the batch cap of {}",
                    params.len(),
                    MAX_BATCH_PARAMS
                ),
            ));
        }
    }
    for (key, value) in obj {
        if let Some(s) = value.as_str() {
            if s.chars().count() > MAX_QUERY_CHARS {
                return Err(BridgeError::invalid_input(
                    key.clone(),
                    format!("string longer than {} characters", MAX_QUERY_CHARS),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn caps_reject_oversized_collections() {
        let notes: Vec<Value> = (0..10_001).map(|i| json!({"pitch": i % 128})).collect();
        assert!(validate_size_caps(&json!({"notes": notes})).is_err());

        let points: Vec<Value> = (0..501).map(|i| json!({"time": i})).collect();
        assert!(validate_size_caps(&json!({"points": points})).is_err());

        let params: Vec<Value> = (0..201).map(|i| json!({"index": i})).collect();
        assert!(validate_size_caps(&json!({"parameters": params})).is_err());
    }

    #[test]
    fn caps_reject_long_strings() {
        let q = "x".repeat(501);
        assert!(validate_size_caps(&json!({"query": q})).is_err());
        assert!(validate_size_caps(&json!({"query": "wavetable"})).is_ok());
    }

    #[test]
    fn caps_pass_reasonable_input() {
        let notes: Vec<Value> = (0..64).map(|i| json!({"pitch": 60 + i % 12})).collect();
        assert!(validate_size_caps(&json!({"notes": notes, "track_index": 0})).is_ok());
        assert!(validate_size_caps(&json!(null)).is_ok());
    }
}
