//! MCP prompts - workflow templates for common bridge operations.
//!
//! Prompts solve discoverability: instead of guessing tool sequences, the
//! agent gets a pre-built plan with its arguments filled in.

use std::collections::HashMap;

use rmcp::{
    model::{GetPromptResult, Prompt, PromptArgument, PromptMessage, PromptMessageRole},
    ErrorData as McpError,
};

pub struct PromptRegistry;

impl PromptRegistry {
    pub fn list() -> Vec<Prompt> {
        vec![
            Prompt::new(
                "build_instrument_track",
                Some("Create a named, colored track with an instrument loaded"),
                Some(vec![
                    PromptArgument {
                        name: "instrument".into(),
                        title: Some("Instrument".into()),
                        description: Some("Instrument name, e.g. 'Wavetable'".into()),
                        required: Some(true),
                    },
                    PromptArgument {
                        name: "track_name".into(),
                        title: Some("Track Name".into()),
                        description: Some("Name for the new track".into()),
                        required: Some(false),
                    },
                ]),
            ),
            Prompt::new(
                "sound_design_pass",
                Some("Discover a device's parameters, snapshot, then shape the sound"),
                Some(vec![
                    PromptArgument {
                        name: "track_index".into(),
                        title: Some("Track".into()),
                        description: Some("Zero-based track index".into()),
                        required: Some(true),
                    },
                    PromptArgument {
                        name: "device_index".into(),
                        title: Some("Device".into()),
                        description: Some("Zero-based device index".into()),
                        required: Some(true),
                    },
                ]),
            ),
        ]
    }

    pub fn get(name: &str, args: &HashMap<String, String>) -> Result<GetPromptResult, McpError> {
        match name {
            "build_instrument_track" => Self::build_instrument_track(args),
            "sound_design_pass" => Self::sound_design_pass(args),
            _ => Err(McpError::invalid_params(
                format!("Unknown prompt: {}", name),
                None,
            )),
        }
    }

    fn build_instrument_track(
        args: &HashMap<String, String>,
    ) -> Result<GetPromptResult, McpError> {
        let instrument = args
            .get("instrument")
            .ok_or_else(|| McpError::invalid_params("instrument argument is required", None))?;
        let track_name = args
            .get("track_name")
            .cloned()
            .unwrap_or_else(|| instrument.clone());

        Ok(GetPromptResult {
            description: Some(format!("Build a track for {}", instrument)),
            messages: vec![PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    r#"Set up a playable instrument track:

1. Call `create_instrument_track` with instrument_name="{instrument}", track_name="{track_name}".
   The result lists every sub-step; note the returned track_index.
2. Call `create_clip` on that track (clip_index 0, length 4) so there is somewhere to write notes.
3. Verify with `get_tracks` that the device chain shows the instrument.

If the instrument name fails to resolve, call `search_catalog` with query="{instrument}" and retry with the best match's URI."#,
                    instrument = instrument,
                    track_name = track_name,
                ),
            )],
        })
    }

    fn sound_design_pass(args: &HashMap<String, String>) -> Result<GetPromptResult, McpError> {
        let track = args
            .get("track_index")
            .ok_or_else(|| McpError::invalid_params("track_index argument is required", None))?;
        let device = args
            .get("device_index")
            .ok_or_else(|| McpError::invalid_params("device_index argument is required", None))?;

        Ok(GetPromptResult {
            description: Some(format!("Sound design on device {}:{}", track, device)),
            messages: vec![PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    r#"Shape the sound of device {device} on track {track} safely:

1. `discover_device_parameters` (track_index={track}, device_index={device}) to map the full parameter set.
2. `snapshot_device` with snapshot_id="before-design" so the starting point is restorable.
3. Apply changes in batches with `batch_set_device_parameters` (at most 200 writes per call).
4. For continuous sweeps, prefer `set_parameter_realtime` or a macro controller
   (`create_macro_controller` + `set_macro_value`).
5. If the result is wrong, `restore_snapshot` with snapshot_id="before-design"."#,
                    track = track,
                    device = device,
                ),
            )],
        })
    }
}

/// Convert MCP prompt arguments to a string map.
pub fn args_to_hashmap(
    args: Option<&serde_json::Map<String, serde_json::Value>>,
) -> HashMap<String, String> {
    args.map(|obj| {
        obj.iter()
            .filter_map(|(k, v)| {
                let s = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((k.clone(), s))
            })
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_prompts_resolve() {
        for prompt in PromptRegistry::list() {
            let mut args = HashMap::new();
            args.insert("instrument".to_string(), "Wavetable".to_string());
            args.insert("track_index".to_string(), "0".to_string());
            args.insert("device_index".to_string(), "0".to_string());
            let result = PromptRegistry::get(&prompt.name, &args).unwrap();
            assert!(!result.messages.is_empty());
        }
    }

    #[test]
    fn unknown_prompt_is_invalid_params() {
        assert!(PromptRegistry::get("no_such_prompt", &HashMap::new()).is_err());
    }

    #[test]
    fn missing_required_arg_is_rejected() {
        assert!(PromptRegistry::get("build_instrument_track", &HashMap::new()).is_err());
    }
}
