//! Track tools: listing, creation, naming, color, mixer state, and the
//! compound instrument-track workflow.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use stageproto::{BridgeError, DawCommand};

use crate::api::{handler, parse_args, schemas, Needs, ToolOutput, ToolRegistry, ToolSpec};
use crate::state::AppState;

/// How long the compound workflow waits for the catalog before passing the
/// instrument name straight to the DAW.
const RESOLVE_WAIT: std::time::Duration = std::time::Duration::from_secs(5);

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: "get_tracks",
        description: "List the session's tracks with their names, types, and device chains.",
        schema: schemas::object(&[], &[]),
        needs: Needs::DAW,
        error_prefix: "Failed to list tracks",
        handler: handler(get_tracks),
    });

    registry.register(ToolSpec {
        name: "create_midi_track",
        description: "Create a new MIDI track. Not retried on transport failure.",
        schema: schemas::object(
            &[("index", schemas::integer("Insert position, -1 appends"))],
            &[],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to create MIDI track",
        handler: handler(create_midi_track),
    });

    registry.register(ToolSpec {
        name: "create_audio_track",
        description: "Create a new audio track. Not retried on transport failure.",
        schema: schemas::object(
            &[("index", schemas::integer("Insert position, -1 appends"))],
            &[],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to create audio track",
        handler: handler(create_audio_track),
    });

    registry.register(ToolSpec {
        name: "set_track_name",
        description: "Rename a track.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("name", schemas::string("New track name")),
            ],
            &["track_index", "name"],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to set track name",
        handler: handler(set_track_name),
    });

    registry.register(ToolSpec {
        name: "set_track_color",
        description: "Set a track's color by palette index.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("color_index", schemas::integer("Color palette index")),
            ],
            &["track_index", "color_index"],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to set track color",
        handler: handler(set_track_color),
    });

    registry.register(ToolSpec {
        name: "set_track_mixer",
        description: "Set any of a track's mixer properties in one call: \
                      volume, pan, mute, solo, arm.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("volume", schemas::number("Volume 0.0-1.0")),
                ("pan", schemas::number("Pan -1.0 (left) to 1.0 (right)")),
                ("mute", schemas::boolean("Mute state")),
                ("solo", schemas::boolean("Solo state")),
                ("arm", schemas::boolean("Record-arm state")),
            ],
            &["track_index"],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to set mixer state",
        handler: handler(set_track_mixer),
    });

    registry.register(ToolSpec {
        name: "create_instrument_track",
        description: "Create a MIDI track, load an instrument onto it by name or URI, \
                      then optionally name and color the track. Reports each step.",
        schema: schemas::object(
            &[
                (
                    "instrument_name",
                    schemas::string("Instrument name (resolved via the catalog) or a URI"),
                ),
                ("track_name", schemas::string("Optional track name")),
                ("color", schemas::integer("Optional color palette index")),
            ],
            &["instrument_name"],
        ),
        needs: Needs::DAW_AND_CATALOG,
        error_prefix: "Failed to create instrument track",
        handler: handler(create_instrument_track),
    });
}

async fn get_tracks(state: Arc<AppState>, _args: Value) -> Result<ToolOutput, BridgeError> {
    let result = state.pipeline.execute(DawCommand::new("get_tracks")).await?;
    let count = result
        .get("tracks")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    Ok(ToolOutput::with_data(format!("{} tracks", count), result))
}

#[derive(Deserialize)]
struct CreateTrackArgs {
    #[serde(default = "default_index")]
    index: i64,
}

fn default_index() -> i64 {
    -1
}

async fn create_midi_track(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: CreateTrackArgs = parse_args("create_midi_track", args)?;
    let result = state
        .pipeline
        .execute(DawCommand::new("create_midi_track").with_param("index", p.index))
        .await?;
    Ok(ToolOutput::with_data("MIDI track created", result))
}

async fn create_audio_track(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: CreateTrackArgs = parse_args("create_audio_track", args)?;
    let result = state
        .pipeline
        .execute(DawCommand::new("create_audio_track").with_param("index", p.index))
        .await?;
    Ok(ToolOutput::with_data("Audio track created", result))
}

#[derive(Deserialize)]
struct SetTrackNameArgs {
    track_index: i64,
    name: String,
}

async fn set_track_name(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: SetTrackNameArgs = parse_args("set_track_name", args)?;
    state
        .pipeline
        .execute(
            DawCommand::new("set_track_name")
                .with_param("track_index", p.track_index)
                .with_param("name", p.name.clone()),
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "Track {} renamed to '{}'",
        p.track_index, p.name
    )))
}

#[derive(Deserialize)]
struct SetTrackColorArgs {
    track_index: i64,
    color_index: i64,
}

async fn set_track_color(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: SetTrackColorArgs = parse_args("set_track_color", args)?;
    state
        .pipeline
        .execute(
            DawCommand::new("set_track_color")
                .with_param("track_index", p.track_index)
                .with_param("color_index", p.color_index),
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "Track {} color set",
        p.track_index
    )))
}

#[derive(Deserialize)]
struct MixerArgs {
    track_index: i64,
    volume: Option<f64>,
    pan: Option<f64>,
    mute: Option<bool>,
    solo: Option<bool>,
    arm: Option<bool>,
}

async fn set_track_mixer(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: MixerArgs = parse_args("set_track_mixer", args)?;
    let mut applied = Vec::new();

    if let Some(volume) = p.volume {
        state
            .pipeline
            .execute(
                DawCommand::new("set_track_volume")
                    .with_param("track_index", p.track_index)
                    .with_param("volume", volume),
            )
            .await?;
        applied.push("volume");
    }
    if let Some(pan) = p.pan {
        state
            .pipeline
            .execute(
                DawCommand::new("set_track_pan")
                    .with_param("track_index", p.track_index)
                    .with_param("pan", pan),
            )
            .await?;
        applied.push("pan");
    }
    if let Some(mute) = p.mute {
        state
            .pipeline
            .execute(
                DawCommand::new("set_track_mute")
                    .with_param("track_index", p.track_index)
                    .with_param("mute", mute),
            )
            .await?;
        applied.push("mute");
    }
    if let Some(solo) = p.solo {
        state
            .pipeline
            .execute(
                DawCommand::new("set_track_solo")
                    .with_param("track_index", p.track_index)
                    .with_param("solo", solo),
            )
            .await?;
        applied.push("solo");
    }
    if let Some(arm) = p.arm {
        let command_type = if arm { "arm_track" } else { "disarm_track" };
        state
            .pipeline
            .execute(DawCommand::new(command_type).with_param("track_index", p.track_index))
            .await?;
        applied.push("arm");
    }

    if applied.is_empty() {
        return Err(BridgeError::invalid_input(
            "track_index",
            "no mixer property given; supply at least one of volume/pan/mute/solo/arm",
        ));
    }
    Ok(ToolOutput::message(format!(
        "Track {}: set {}",
        p.track_index,
        applied.join(", ")
    )))
}

#[derive(Deserialize)]
struct InstrumentTrackArgs {
    instrument_name: String,
    track_name: Option<String>,
    color: Option<i64>,
}

/// The compound workflow: create, load, name, color - each sub-step paced
/// by the pipeline, with per-step results in the success payload.
async fn create_instrument_track(
    state: Arc<AppState>,
    args: Value,
) -> Result<ToolOutput, BridgeError> {
    let p: InstrumentTrackArgs = parse_args("create_instrument_track", args)?;
    let mut steps: Vec<Value> = Vec::new();

    let created = state
        .pipeline
        .execute(DawCommand::new("create_midi_track").with_param("index", -1))
        .await?;
    let track_index = created
        .get("index")
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            BridgeError::Protocol("create_midi_track response had no track index".into())
        })?;
    steps.push(json!({"step": "create_midi_track", "result": created}));

    let uri = state.catalog.resolve(&p.instrument_name, RESOLVE_WAIT).await;
    let loaded = state
        .pipeline
        .execute(
            DawCommand::new("load_instrument_or_effect")
                .with_param("track_index", track_index)
                .with_param("uri", uri.clone()),
        )
        .await?;
    steps.push(json!({"step": "load_instrument_or_effect", "uri": uri, "result": loaded}));

    if let Some(ref name) = p.track_name {
        let renamed = state
            .pipeline
            .execute(
                DawCommand::new("set_track_name")
                    .with_param("track_index", track_index)
                    .with_param("name", name.clone()),
            )
            .await?;
        steps.push(json!({"step": "set_track_name", "result": renamed}));
    }
    if let Some(color) = p.color {
        let colored = state
            .pipeline
            .execute(
                DawCommand::new("set_track_color")
                    .with_param("track_index", track_index)
                    .with_param("color_index", color),
            )
            .await?;
        steps.push(json!({"step": "set_track_color", "result": colored}));
    }

    Ok(ToolOutput::with_data(
        format!(
            "Instrument track {} ready with '{}'",
            track_index, p.instrument_name
        ),
        json!({"track_index": track_index, "steps": steps}),
    ))
}
