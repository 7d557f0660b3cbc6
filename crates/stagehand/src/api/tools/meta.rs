//! Capabilities reporting.

use std::sync::Arc;

use serde_json::Value;

use stageproto::BridgeError;

use crate::api::{handler, schemas, Needs, ToolOutput, ToolRegistry, ToolSpec};
use crate::state::AppState;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: "get_capabilities",
        description: "Report bridge capabilities: DAW and bridge connectivity, catalog \
                      state, tool count, versions. Served from memory.",
        schema: schemas::object(&[], &[]),
        needs: Needs::NONE,
        error_prefix: "Failed to report capabilities",
        handler: handler(get_capabilities),
    });
}

async fn get_capabilities(state: Arc<AppState>, _args: Value) -> Result<ToolOutput, BridgeError> {
    let caps = state.capabilities();
    Ok(ToolOutput::with_data("Capabilities", caps))
}
