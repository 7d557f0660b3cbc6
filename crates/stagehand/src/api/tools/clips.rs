//! Clip tools: creation, notes, launch.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use stageproto::{BridgeError, DawCommand};

use crate::api::{handler, parse_args, schemas, Needs, ToolOutput, ToolRegistry, ToolSpec};
use crate::state::AppState;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: "create_clip",
        description: "Create an empty MIDI clip in a session slot.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("clip_index", schemas::clip_index()),
                ("length", schemas::number("Clip length in beats")),
            ],
            &["track_index", "clip_index"],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to create clip",
        handler: handler(create_clip),
    });

    registry.register(ToolSpec {
        name: "add_notes_to_clip",
        description: "Add MIDI notes to an existing clip. Not retried on transport failure.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("clip_index", schemas::clip_index()),
                (
                    "notes",
                    schemas::array(schemas::note_object(), "Notes to add (max 10000)"),
                ),
            ],
            &["track_index", "clip_index", "notes"],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to add notes",
        handler: handler(add_notes_to_clip),
    });

    registry.register(ToolSpec {
        name: "fire_clip",
        description: "Launch a session clip.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                ("clip_index", schemas::clip_index()),
            ],
            &["track_index", "clip_index"],
        ),
        needs: Needs::DAW,
        error_prefix: "Failed to fire clip",
        handler: handler(fire_clip),
    });
}

#[derive(Deserialize)]
struct CreateClipArgs {
    track_index: i64,
    clip_index: i64,
    #[serde(default = "default_length")]
    length: f64,
}

fn default_length() -> f64 {
    4.0
}

async fn create_clip(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: CreateClipArgs = parse_args("create_clip", args)?;
    if p.length <= 0.0 {
        return Err(BridgeError::invalid_input(
            "length",
            "clip length must be positive",
        ));
    }
    let result = state
        .pipeline
        .execute(
            DawCommand::new("create_clip")
                .with_param("track_index", p.track_index)
                .with_param("clip_index", p.clip_index)
                .with_param("length", p.length),
        )
        .await?;
    Ok(ToolOutput::with_data(
        format!(
            "Created {}-beat clip at {}:{}",
            p.length, p.track_index, p.clip_index
        ),
        result,
    ))
}

#[derive(Deserialize)]
struct Note {
    pitch: i64,
    start_time: f64,
    duration: f64,
    #[serde(default = "default_velocity")]
    velocity: i64,
    #[serde(default)]
    mute: bool,
}

fn default_velocity() -> i64 {
    100
}

#[derive(Deserialize)]
struct AddNotesArgs {
    track_index: i64,
    clip_index: i64,
    notes: Vec<Note>,
}

async fn add_notes_to_clip(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: AddNotesArgs = parse_args("add_notes_to_clip", args)?;
    if p.notes.is_empty() {
        return Err(BridgeError::invalid_input("notes", "no notes supplied"));
    }
    for (i, note) in p.notes.iter().enumerate() {
        if !(0..=127).contains(&note.pitch) {
            return Err(BridgeError::invalid_input(
                "notes",
                format!("note {} pitch {} outside 0-127", i, note.pitch),
            ));
        }
        if !(1..=127).contains(&note.velocity) {
            return Err(BridgeError::invalid_input(
                "notes",
                format!("note {} velocity {} outside 1-127", i, note.velocity),
            ));
        }
        if note.duration <= 0.0 {
            return Err(BridgeError::invalid_input(
                "notes",
                format!("note {} duration must be positive", i),
            ));
        }
    }

    let count = p.notes.len();
    let notes: Vec<Value> = p
        .notes
        .iter()
        .map(|n| {
            serde_json::json!({
                "pitch": n.pitch,
                "start_time": n.start_time,
                "duration": n.duration,
                "velocity": n.velocity,
                "mute": n.mute,
            })
        })
        .collect();

    state
        .pipeline
        .execute(
            DawCommand::new("add_notes_to_clip")
                .with_param("track_index", p.track_index)
                .with_param("clip_index", p.clip_index)
                .with_param("notes", notes),
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "Added {} notes to clip {}:{}",
        count, p.track_index, p.clip_index
    )))
}

#[derive(Deserialize)]
struct FireClipArgs {
    track_index: i64,
    clip_index: i64,
}

async fn fire_clip(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: FireClipArgs = parse_args("fire_clip", args)?;
    state
        .pipeline
        .execute(
            DawCommand::new("fire_clip")
                .with_param("track_index", p.track_index)
                .with_param("clip_index", p.clip_index),
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "Fired clip {}:{}",
        p.track_index, p.clip_index
    )))
}
