//! Session-level tools: overview, tempo, transport.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use stageproto::{BridgeError, DawCommand};

use crate::api::{handler, parse_args, schemas, Needs, ToolOutput, ToolRegistry, ToolSpec};
use crate::state::AppState;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: "get_session_info",
        description: "Get an overview of the current session: tempo, time signature, \
                      track and scene counts, playback state.",
        schema: schemas::object(&[], &[]),
        needs: Needs::DAW,
        error_prefix: "Failed to get session info",
        handler: handler(get_session_info),
    });

    registry.register(ToolSpec {
        name: "set_tempo",
        description: "Set the session tempo in BPM.",
        schema: schemas::object(&[("bpm", schemas::number("Tempo in BPM (20-999)"))], &["bpm"]),
        needs: Needs::DAW,
        error_prefix: "Failed to set tempo",
        handler: handler(set_tempo),
    });

    registry.register(ToolSpec {
        name: "control_playback",
        description: "Start, stop, or continue session playback.",
        schema: schemas::object(
            &[(
                "action",
                schemas::string("One of 'play', 'stop', 'continue'"),
            )],
            &["action"],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to control playback",
        handler: handler(control_playback),
    });
}

async fn get_session_info(state: Arc<AppState>, _args: Value) -> Result<ToolOutput, BridgeError> {
    let result = state
        .pipeline
        .execute(DawCommand::new("get_session_info"))
        .await?;
    Ok(ToolOutput::with_data("Session info retrieved", result))
}

#[derive(Deserialize)]
struct SetTempoArgs {
    bpm: f64,
}

async fn set_tempo(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: SetTempoArgs = parse_args("set_tempo", args)?;
    if !(20.0..=999.0).contains(&p.bpm) {
        return Err(BridgeError::invalid_input(
            "bpm",
            format!("{} is outside 20-999", p.bpm),
        ));
    }
    state
        .pipeline
        .execute(DawCommand::new("set_tempo").with_param("bpm", p.bpm))
        .await?;
    Ok(ToolOutput::message(format!("Tempo set to {} BPM", p.bpm)))
}

#[derive(Deserialize)]
struct PlaybackArgs {
    action: String,
}

async fn control_playback(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: PlaybackArgs = parse_args("control_playback", args)?;
    let command_type = match p.action.as_str() {
        "play" => "start_playback",
        "stop" => "stop_playback",
        "continue" => "continue_playing",
        other => {
            return Err(BridgeError::invalid_input(
                "action",
                format!("'{}' is not one of play/stop/continue", other),
            ))
        }
    };
    state.pipeline.execute(DawCommand::new(command_type)).await?;
    Ok(ToolOutput::message(format!("Playback: {}", p.action)))
}
