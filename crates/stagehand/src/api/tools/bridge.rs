//! Deep-parameter tools over the OSC bridge.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use stageproto::BridgeError;

use crate::api::{handler, parse_args, schemas, Needs, ToolOutput, ToolRegistry, ToolSpec};
use crate::daw::bridge::BridgeRequest;
use crate::state::AppState;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: "discover_device_parameters",
        description: "Discover every parameter of a device through the bridge, including \
                      ones the DAW does not expose over the command channel. Large \
                      devices stream back in chunks; the timeout scales accordingly.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("device_index", schemas::device_index()),
            ],
            &["track_index", "device_index"],
        ),
        needs: Needs::BRIDGE,
        error_prefix: "Parameter discovery failed",
        handler: handler(discover_device_parameters),
    });

    registry.register(ToolSpec {
        name: "get_device_parameters_deep",
        description: "Read current values of a device's hidden parameters via the bridge.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("device_index", schemas::device_index()),
            ],
            &["track_index", "device_index"],
        ),
        needs: Needs::BRIDGE,
        error_prefix: "Failed to read deep parameters",
        handler: handler(get_device_parameters_deep),
    });

    registry.register(ToolSpec {
        name: "set_device_parameter_deep",
        description: "Set one hidden device parameter by discovery index via the bridge.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("device_index", schemas::device_index()),
                (
                    "parameter_index",
                    schemas::integer("Parameter index from discovery"),
                ),
                ("value", schemas::number("New value in the parameter's native range")),
            ],
            &["track_index", "device_index", "parameter_index", "value"],
        ),
        needs: Needs::BRIDGE,
        error_prefix: "Failed to set deep parameter",
        handler: handler(set_device_parameter_deep),
    });

    registry.register(ToolSpec {
        name: "batch_set_device_parameters",
        description: "Set many hidden parameters in one bridge operation (max 200). \
                      Retries automatically while the bridge is busy.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("device_index", schemas::device_index()),
                (
                    "parameters",
                    schemas::array(schemas::param_write_object(), "Writes to apply"),
                ),
            ],
            &["track_index", "device_index", "parameters"],
        ),
        needs: Needs::BRIDGE,
        error_prefix: "Batch parameter set failed",
        handler: handler(batch_set_device_parameters),
    });

    registry.register(ToolSpec {
        name: "get_bridge_status",
        description: "Ping the bridge device and report its version.",
        schema: schemas::object(&[], &[]),
        needs: Needs::NONE,
        error_prefix: "Bridge status check failed",
        handler: handler(get_bridge_status),
    });
}

#[derive(Deserialize)]
struct DeviceArgs {
    track_index: i32,
    device_index: i32,
}

async fn discover_device_parameters(
    state: Arc<AppState>,
    args: Value,
) -> Result<ToolOutput, BridgeError> {
    let p: DeviceArgs = parse_args("discover_device_parameters", args)?;
    let result = state
        .bridge
        .request_queued(&BridgeRequest::discover_params(
            p.track_index,
            p.device_index,
        ))
        .await?;
    let count = result
        .get("parameters")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    Ok(ToolOutput::with_data(
        format!(
            "Discovered {} parameters on device {}:{}",
            count, p.track_index, p.device_index
        ),
        result,
    ))
}

async fn get_device_parameters_deep(
    state: Arc<AppState>,
    args: Value,
) -> Result<ToolOutput, BridgeError> {
    let p: DeviceArgs = parse_args("get_device_parameters_deep", args)?;
    let result = state
        .bridge
        .request_queued(&BridgeRequest::get_hidden_params(
            p.track_index,
            p.device_index,
        ))
        .await?;
    Ok(ToolOutput::with_data("Deep parameters read", result))
}

#[derive(Deserialize)]
struct SetDeepParamArgs {
    track_index: i32,
    device_index: i32,
    parameter_index: i32,
    value: f32,
}

async fn set_device_parameter_deep(
    state: Arc<AppState>,
    args: Value,
) -> Result<ToolOutput, BridgeError> {
    let p: SetDeepParamArgs = parse_args("set_device_parameter_deep", args)?;
    state
        .bridge
        .request(&BridgeRequest::set_hidden_param(
            p.track_index,
            p.device_index,
            p.parameter_index,
            p.value,
        ))
        .await?;
    Ok(ToolOutput::message(format!(
        "Parameter {} on device {}:{} set to {}",
        p.parameter_index, p.track_index, p.device_index, p.value
    )))
}

#[derive(Deserialize)]
struct BatchArgs {
    track_index: i32,
    device_index: i32,
    parameters: Vec<Value>,
}

async fn batch_set_device_parameters(
    state: Arc<AppState>,
    args: Value,
) -> Result<ToolOutput, BridgeError> {
    let p: BatchArgs = parse_args("batch_set_device_parameters", args)?;
    if p.parameters.is_empty() {
        return Err(BridgeError::invalid_input(
            "parameters",
            "no parameter writes supplied",
        ));
    }
    let parameters = Value::Array(p.parameters);
    let result = state
        .bridge
        .request_queued(&BridgeRequest::batch_set_hidden_params(
            p.track_index,
            p.device_index,
            &parameters,
        ))
        .await?;
    Ok(ToolOutput::with_data("Batch applied", result))
}

async fn get_bridge_status(state: Arc<AppState>, _args: Value) -> Result<ToolOutput, BridgeError> {
    match state.bridge.ping().await {
        Ok(version) => Ok(ToolOutput::with_data(
            format!("Bridge responding, version {}", version),
            json!({"connected": true, "version": version}),
        )),
        Err(e) => Ok(ToolOutput::with_data(
            format!("Bridge not responding: {}", e),
            json!({"connected": false}),
        )),
    }
}
