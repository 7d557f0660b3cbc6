//! Store-backed tools: realtime parameter sends, device snapshots, macro
//! controllers, and parameter-map lookups.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use stageproto::{BridgeError, DawCommand};

use crate::api::{handler, parse_args, schemas, Needs, ToolOutput, ToolRegistry, ToolSpec};
use crate::state::AppState;
use crate::stores::macros::{Curve, MacroBinding, MacroController};
use crate::stores::snapshots::{DeviceSnapshot, ParameterValue};
use crate::stores::DeviceRef;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: "set_parameter_realtime",
        description: "Fire one parameter update over the realtime UDP channel. \
                      No acknowledgement, no ordering guarantee; meant for \
                      high-frequency sweeps.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("device_index", schemas::device_index()),
                ("parameter_index", schemas::integer("Parameter index")),
                ("value", schemas::number("New value")),
            ],
            &["track_index", "device_index", "parameter_index", "value"],
        ),
        needs: Needs::NONE,
        error_prefix: "Realtime send failed",
        handler: handler(set_parameter_realtime),
    });

    registry.register(ToolSpec {
        name: "snapshot_device",
        description: "Capture a device's current parameter values under a caller-chosen \
                      id. Snapshots are immutable and live for the process.",
        schema: schemas::object(
            &[
                ("snapshot_id", schemas::string("Id to store the snapshot under")),
                ("track_index", schemas::track_index()),
                ("device_index", schemas::device_index()),
            ],
            &["snapshot_id", "track_index", "device_index"],
        ),
        needs: Needs::DAW,
        error_prefix: "Snapshot failed",
        handler: handler(snapshot_device),
    });

    registry.register(ToolSpec {
        name: "restore_snapshot",
        description: "Restore a device to a previously captured snapshot.",
        schema: schemas::object(
            &[("snapshot_id", schemas::string("Id of the snapshot to restore"))],
            &["snapshot_id"],
        ),
        needs: Needs::DAW,
        error_prefix: "Restore failed",
        handler: handler(restore_snapshot),
    });

    registry.register(ToolSpec {
        name: "list_snapshots",
        description: "List stored device snapshots.",
        schema: schemas::object(&[], &[]),
        needs: Needs::NONE,
        error_prefix: "Failed to list snapshots",
        handler: handler(list_snapshots),
    });

    registry.register(ToolSpec {
        name: "create_macro_controller",
        description: "Create or replace a macro controller: one 0..1 input mapped onto \
                      several device parameters, each with its own range and curve.",
        schema: schemas::object(
            &[
                ("macro_id", schemas::string("Id for the controller")),
                (
                    "bindings",
                    schemas::array(binding_schema(), "Parameter bindings"),
                ),
            ],
            &["macro_id", "bindings"],
        ),
        needs: Needs::NONE,
        error_prefix: "Failed to create macro",
        handler: handler(create_macro_controller),
    });

    registry.register(ToolSpec {
        name: "set_macro_value",
        description: "Apply a 0..1 value to a macro controller; each binding's shaped \
                      output goes out over the realtime channel.",
        schema: schemas::object(
            &[
                ("macro_id", schemas::string("Controller id")),
                ("value", schemas::number("Macro input 0.0-1.0")),
            ],
            &["macro_id", "value"],
        ),
        needs: Needs::NONE,
        error_prefix: "Failed to set macro value",
        handler: handler(set_macro_value),
    });

    registry.register(ToolSpec {
        name: "list_macro_controllers",
        description: "List macro controllers and their bindings.",
        schema: schemas::object(&[], &[]),
        needs: Needs::NONE,
        error_prefix: "Failed to list macros",
        handler: handler(list_macro_controllers),
    });

    registry.register(ToolSpec {
        name: "get_parameter_map",
        description: "Look up friendly parameter names for a known device kind.",
        schema: schemas::object(
            &[(
                "device_kind",
                schemas::string("Device kind, e.g. 'wavetable', 'operator', 'compressor'"),
            )],
            &["device_kind"],
        ),
        needs: Needs::NONE,
        error_prefix: "Parameter map lookup failed",
        handler: handler(get_parameter_map),
    });
}

fn binding_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "device": {
                "type": "object",
                "properties": {
                    "track_index": {"type": "integer", "description": "Zero-based track index"},
                    "device_index": {"type": "integer", "description": "Zero-based device index"}
                },
                "required": ["track_index", "device_index"]
            },
            "parameter_index": {"type": "integer", "description": "Parameter index"},
            "parameter_name": {"type": "string", "description": "Parameter name, informational"},
            "min_out": {"type": "number", "description": "Output at macro value 0"},
            "max_out": {"type": "number", "description": "Output at macro value 1"},
            "curve": {"type": "string", "description": "linear, exponential, or logarithmic"}
        },
        "required": ["device", "parameter_index", "min_out", "max_out"]
    })
}

#[derive(Deserialize)]
struct RealtimeArgs {
    track_index: i64,
    device_index: i64,
    parameter_index: i64,
    value: f64,
}

async fn set_parameter_realtime(
    state: Arc<AppState>,
    args: Value,
) -> Result<ToolOutput, BridgeError> {
    let p: RealtimeArgs = parse_args("set_parameter_realtime", args)?;
    state
        .realtime
        .send(
            &DawCommand::new("set_device_parameter")
                .with_param("track_index", p.track_index)
                .with_param("device_index", p.device_index)
                .with_param("parameter_index", p.parameter_index)
                .with_param("value", p.value),
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "Sent parameter {} = {} (best-effort)",
        p.parameter_index, p.value
    )))
}

#[derive(Deserialize)]
struct SnapshotArgs {
    snapshot_id: String,
    track_index: i32,
    device_index: i32,
}

async fn snapshot_device(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: SnapshotArgs = parse_args("snapshot_device", args)?;
    let result = state
        .pipeline
        .execute(
            DawCommand::new("get_device_parameters")
                .with_param("track_index", p.track_index)
                .with_param("device_index", p.device_index),
        )
        .await?;

    let parameters: Vec<ParameterValue> = result
        .get("parameters")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|v| {
                    Some(ParameterValue {
                        name: v.get("name")?.as_str()?.to_string(),
                        value: v.get("value")?.as_f64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if parameters.is_empty() {
        return Err(BridgeError::Protocol(
            "device reported no parameters to snapshot".into(),
        ));
    }

    let count = parameters.len();
    state.snapshots.insert(DeviceSnapshot {
        id: p.snapshot_id.clone(),
        created_at: Utc::now(),
        device: DeviceRef {
            track_index: p.track_index,
            device_index: p.device_index,
        },
        parameters,
    })?;

    Ok(ToolOutput::message(format!(
        "Snapshot '{}' captured {} parameters from device {}:{}",
        p.snapshot_id, count, p.track_index, p.device_index
    )))
}

#[derive(Deserialize)]
struct RestoreArgs {
    snapshot_id: String,
}

async fn restore_snapshot(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: RestoreArgs = parse_args("restore_snapshot", args)?;
    let snapshot = state.snapshots.get(&p.snapshot_id).ok_or_else(|| {
        BridgeError::invalid_input("snapshot_id", format!("no snapshot '{}'", p.snapshot_id))
    })?;

    let writes: Vec<Value> = snapshot
        .parameters
        .iter()
        .map(|param| json!({"name": param.name, "value": param.value}))
        .collect();

    state
        .pipeline
        .execute(
            DawCommand::new("set_device_parameters")
                .with_param("track_index", snapshot.device.track_index)
                .with_param("device_index", snapshot.device.device_index)
                .with_param("parameters", writes),
        )
        .await?;

    Ok(ToolOutput::message(format!(
        "Restored snapshot '{}' ({} parameters) to device {}:{}",
        p.snapshot_id,
        snapshot.parameters.len(),
        snapshot.device.track_index,
        snapshot.device.device_index
    )))
}

async fn list_snapshots(state: Arc<AppState>, _args: Value) -> Result<ToolOutput, BridgeError> {
    let all = state.snapshots.list();
    let data = serde_json::to_value(&all)
        .map_err(|e| BridgeError::Internal(format!("snapshot encode: {}", e)))?;
    Ok(ToolOutput::with_data(
        format!("{} snapshots", all.len()),
        json!({"snapshots": data}),
    ))
}

#[derive(Deserialize)]
struct BindingInput {
    device: DeviceRef,
    parameter_index: i32,
    #[serde(default)]
    parameter_name: String,
    min_out: f64,
    max_out: f64,
    #[serde(default = "default_curve")]
    curve: Curve,
}

fn default_curve() -> Curve {
    Curve::Linear
}

#[derive(Deserialize)]
struct CreateMacroArgs {
    macro_id: String,
    bindings: Vec<BindingInput>,
}

async fn create_macro_controller(
    state: Arc<AppState>,
    args: Value,
) -> Result<ToolOutput, BridgeError> {
    let p: CreateMacroArgs = parse_args("create_macro_controller", args)?;
    if p.bindings.is_empty() {
        return Err(BridgeError::invalid_input("bindings", "no bindings supplied"));
    }
    let count = p.bindings.len();
    let bindings = p
        .bindings
        .into_iter()
        .map(|b| MacroBinding {
            device: b.device,
            parameter_index: b.parameter_index,
            parameter_name: b.parameter_name,
            min_out: b.min_out,
            max_out: b.max_out,
            curve: b.curve,
        })
        .collect();
    state.macros.upsert(MacroController {
        id: p.macro_id.clone(),
        bindings,
    });
    Ok(ToolOutput::message(format!(
        "Macro '{}' stored with {} bindings",
        p.macro_id, count
    )))
}

#[derive(Deserialize)]
struct SetMacroArgs {
    macro_id: String,
    value: f64,
}

async fn set_macro_value(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: SetMacroArgs = parse_args("set_macro_value", args)?;
    if !(0.0..=1.0).contains(&p.value) {
        return Err(BridgeError::invalid_input(
            "value",
            format!("{} is outside 0.0-1.0", p.value),
        ));
    }
    let controller = state.macros.get(&p.macro_id)?;

    let mut outputs = Vec::with_capacity(controller.bindings.len());
    for binding in &controller.bindings {
        let out = binding.output_for(p.value);
        state
            .realtime
            .send(
                &DawCommand::new("set_device_parameter")
                    .with_param("track_index", binding.device.track_index)
                    .with_param("device_index", binding.device.device_index)
                    .with_param("parameter_index", binding.parameter_index)
                    .with_param("value", out),
            )
            .await?;
        outputs.push(json!({
            "parameter_index": binding.parameter_index,
            "parameter_name": binding.parameter_name,
            "output": out,
        }));
    }

    Ok(ToolOutput::with_data(
        format!(
            "Macro '{}' = {} applied to {} parameters",
            p.macro_id,
            p.value,
            outputs.len()
        ),
        json!({"outputs": outputs}),
    ))
}

async fn list_macro_controllers(
    state: Arc<AppState>,
    _args: Value,
) -> Result<ToolOutput, BridgeError> {
    let all = state.macros.list();
    let data = serde_json::to_value(&all)
        .map_err(|e| BridgeError::Internal(format!("macro encode: {}", e)))?;
    Ok(ToolOutput::with_data(
        format!("{} macro controllers", all.len()),
        json!({"controllers": data}),
    ))
}

#[derive(Deserialize)]
struct ParamMapArgs {
    device_kind: String,
}

async fn get_parameter_map(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: ParamMapArgs = parse_args("get_parameter_map", args)?;
    match state.param_maps.get(&p.device_kind) {
        Some(map) => {
            let data = serde_json::to_value(&map)
                .map_err(|e| BridgeError::Internal(format!("map encode: {}", e)))?;
            Ok(ToolOutput::with_data(
                format!("{} mappings for '{}'", map.mappings.len(), p.device_kind),
                data,
            ))
        }
        None => Err(BridgeError::invalid_input(
            "device_kind",
            format!(
                "no parameter map for '{}'; known kinds: {}",
                p.device_kind,
                state.param_maps.kinds().join(", ")
            ),
        )),
    }
}
