//! Tool handlers, grouped by surface area.
//!
//! Each family registers its specs into the registry; handlers stay thin -
//! parse typed arguments, build DAW commands, go through the pipeline (or
//! the bridge / realtime sender), shape the result. All policy (pacing,
//! retries, envelopes) lives elsewhere.

pub mod bridge;
pub mod catalog;
pub mod chains;
pub mod clips;
pub mod meta;
pub mod session;
pub mod stores;
pub mod tracks;

use crate::api::ToolRegistry;

/// Build the complete tool registry. Called once at startup.
pub fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    session::register(&mut registry);
    tracks::register(&mut registry);
    clips::register(&mut registry);
    catalog::register(&mut registry);
    bridge::register(&mut registry);
    stores::register(&mut registry);
    chains::register(&mut registry);
    meta::register(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_builds_with_unique_names() {
        let registry = build_registry();
        assert!(registry.len() >= 30);
        // Every spec is reachable by its own name.
        for spec in registry.iter() {
            assert!(registry.get(spec.name).is_some());
            assert!(!spec.description.is_empty());
            assert_eq!(spec.schema["type"], "object");
        }
    }

    #[test]
    fn key_tools_are_present() {
        let registry = build_registry();
        for name in [
            "set_tempo",
            "create_instrument_track",
            "discover_device_parameters",
            "load_instrument_or_effect",
            "snapshot_device",
            "save_effect_chain_template",
            "get_capabilities",
        ] {
            assert!(registry.get(name).is_some(), "missing tool {}", name);
        }
    }
}
