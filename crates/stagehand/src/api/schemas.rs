//! Hand-written JSON input schemas for the tool registry.
//!
//! Schemas are kept deliberately plain: every property carries an explicit
//! `type` and a description, nothing emits `default` values, and shared
//! fragments (track/device/clip addressing) come from the helpers below so
//! the surface stays consistent.

use serde_json::{json, Map, Value};

/// An object schema from (name, property-schema) pairs.
pub fn object(properties: &[(&str, Value)], required: &[&str]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

pub fn string(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

pub fn number(description: &str) -> Value {
    json!({"type": "number", "description": description})
}

pub fn integer(description: &str) -> Value {
    json!({"type": "integer", "description": description})
}

pub fn boolean(description: &str) -> Value {
    json!({"type": "boolean", "description": description})
}

pub fn array(items: Value, description: &str) -> Value {
    json!({"type": "array", "items": items, "description": description})
}

pub fn track_index() -> Value {
    integer("Zero-based track index")
}

pub fn device_index() -> Value {
    integer("Zero-based device index on the track")
}

pub fn clip_index() -> Value {
    integer("Zero-based clip slot index")
}

/// A note object as the DAW's note commands expect it.
pub fn note_object() -> Value {
    json!({
        "type": "object",
        "properties": {
            "pitch": {"type": "integer", "description": "MIDI pitch 0-127"},
            "start_time": {"type": "number", "description": "Start in beats"},
            "duration": {"type": "number", "description": "Length in beats"},
            "velocity": {"type": "integer", "description": "Velocity 1-127"},
            "mute": {"type": "boolean", "description": "Whether the note is muted"}
        },
        "required": ["pitch", "start_time", "duration"]
    })
}

/// A deep-parameter write as the bridge's batch command expects it.
pub fn param_write_object() -> Value {
    json!({
        "type": "object",
        "properties": {
            "index": {"type": "integer", "description": "Parameter index from discovery"},
            "value": {"type": "number", "description": "New value, in the parameter's native range"}
        },
        "required": ["index", "value"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_schema_shape() {
        let s = object(
            &[("bpm", number("Tempo in BPM"))],
            &["bpm"],
        );
        assert_eq!(s["type"], "object");
        assert_eq!(s["properties"]["bpm"]["type"], "number");
        assert_eq!(s["required"][0], "bpm");
    }

    #[test]
    fn no_schema_emits_defaults() {
        for s in [note_object(), param_write_object(), track_index()] {
            assert!(!s.to_string().contains("\"default\""));
        }
    }
}
