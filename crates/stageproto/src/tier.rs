//! Command classification: pacing tier, idempotency, timeouts.
//!
//! The pipeline consults these tables for every outgoing command; handlers
//! never reason about pacing or retries themselves. Membership is a closed
//! set mirroring the DAW-side command vocabulary.

use std::time::Duration;

/// Pacing tier. The post-delay runs after a successful send, while the
/// transport writer lock is still held, so the DAW has time to settle
/// before the next command hits the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTier {
    /// Pure property setters and reads. No delay.
    Instant,
    /// Note/clip/automation/parameter edits. 50 ms post-delay.
    Light,
    /// Create/delete/load/freeze operations. 100 ms post-delay.
    Structural,
}

impl CommandTier {
    pub fn post_delay(self) -> Duration {
        match self {
            CommandTier::Instant => Duration::ZERO,
            CommandTier::Light => Duration::from_millis(50),
            CommandTier::Structural => Duration::from_millis(100),
        }
    }
}

/// Classify a command type into its pacing tier.
pub fn classify(command_type: &str) -> CommandTier {
    match command_type {
        // Structural: anything that creates, deletes, or loads entities.
        "create_midi_track"
        | "create_audio_track"
        | "create_return_track"
        | "delete_track"
        | "duplicate_track"
        | "group_tracks"
        | "create_clip"
        | "delete_clip"
        | "duplicate_clip"
        | "create_scene"
        | "delete_scene"
        | "duplicate_scene"
        | "load_instrument_or_effect"
        | "insert_device"
        | "delete_device"
        | "create_take_lane"
        | "freeze_track"
        | "unfreeze_track"
        | "convert_audio_to_midi" => CommandTier::Structural,

        // Light: content edits inside existing entities.
        "add_notes_to_clip"
        | "remove_notes_from_clip"
        | "modify_notes"
        | "quantize_clip"
        | "crop_clip"
        | "set_clip_looping"
        | "set_clip_loop_points"
        | "set_warp_marker"
        | "delete_warp_marker"
        | "set_clip_automation"
        | "clear_clip_automation"
        | "set_device_parameter"
        | "set_device_parameters"
        | "set_song_loop" => CommandTier::Light,

        // Everything else is a property setter or a read.
        _ => CommandTier::Instant,
    }
}

/// Whether repeating a command duplicates its effect on the DAW.
///
/// Non-idempotent commands are never retried by the pipeline; a transport
/// failure mid-flight surfaces immediately.
pub fn is_idempotent(command_type: &str) -> bool {
    !matches!(
        command_type,
        "create_midi_track"
            | "create_audio_track"
            | "create_return_track"
            | "duplicate_track"
            | "delete_track"
            | "group_tracks"
            | "create_clip"
            | "duplicate_clip"
            | "delete_clip"
            | "create_scene"
            | "duplicate_scene"
            | "delete_scene"
            | "add_notes_to_clip"
            | "load_instrument_or_effect"
            | "insert_device"
            | "delete_device"
            | "create_take_lane"
            | "convert_audio_to_midi"
    )
}

/// Default read timeout.
const READ_TIMEOUT: Duration = Duration::from_secs(10);
/// Default timeout for modifying commands.
const MODIFY_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolve the per-command timeout. A closed set of known-slow commands
/// (catalog walks, freeze, audio-to-MIDI) carries an override; an explicit
/// caller timeout takes precedence over all of this at the pipeline.
pub fn timeout_for(command_type: &str) -> Duration {
    match command_type {
        "get_browser_tree" | "freeze_track" | "convert_audio_to_midi" => Duration::from_secs(60),
        "get_browser_items_at_path" | "search_browser" | "analyze_audio_clip" => {
            Duration::from_secs(30)
        }
        "load_instrument_or_effect" => Duration::from_secs(20),
        t if t.starts_with("get_") || t.starts_with("list_") => READ_TIMEOUT,
        _ => MODIFY_TIMEOUT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_setters_are_instant() {
        for t in ["set_tempo", "set_track_name", "set_track_color", "fire_clip", "arm_track"] {
            assert_eq!(classify(t), CommandTier::Instant, "{}", t);
            assert_eq!(classify(t).post_delay(), Duration::ZERO);
        }
    }

    #[test]
    fn edits_are_light() {
        assert_eq!(classify("add_notes_to_clip"), CommandTier::Light);
        assert_eq!(classify("set_device_parameters"), CommandTier::Light);
        assert_eq!(classify("add_notes_to_clip").post_delay(), Duration::from_millis(50));
    }

    #[test]
    fn structure_changes_are_structural() {
        assert_eq!(classify("create_midi_track"), CommandTier::Structural);
        assert_eq!(classify("load_instrument_or_effect"), CommandTier::Structural);
        assert_eq!(
            classify("delete_track").post_delay(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn entity_creation_is_not_idempotent() {
        assert!(!is_idempotent("create_midi_track"));
        assert!(!is_idempotent("add_notes_to_clip"));
        assert!(!is_idempotent("duplicate_clip"));
        assert!(is_idempotent("set_tempo"));
        assert!(is_idempotent("get_session_info"));
        assert!(is_idempotent("set_track_name"));
    }

    #[test]
    fn slow_commands_get_longer_timeouts() {
        assert_eq!(timeout_for("get_browser_tree"), Duration::from_secs(60));
        assert_eq!(timeout_for("get_browser_items_at_path"), Duration::from_secs(30));
        assert_eq!(timeout_for("get_session_info"), Duration::from_secs(10));
        assert_eq!(timeout_for("set_tempo"), Duration::from_secs(15));
    }
}
