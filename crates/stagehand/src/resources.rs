//! MCP resources - read-only entry points into bridge state.
//!
//! Resources give agents grounding without tool calls: capabilities and
//! catalog status come straight from memory; session and track views issue
//! one read command each over the pipeline.

use rmcp::model::{AnnotateAble, RawResource, Resource};
use std::sync::Arc;

use stageproto::{BridgeError, DawCommand};

use crate::state::AppState;

pub struct ResourceRegistry {
    state: Arc<AppState>,
}

impl ResourceRegistry {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// List the static resources.
    pub fn list() -> Vec<Resource> {
        vec![
            raw(
                "stagehand://session",
                "Session",
                "Current session overview: tempo, signature, counts, playback state",
            ),
            raw(
                "stagehand://tracks",
                "Tracks",
                "The session's tracks with names, types, and devices",
            ),
            raw(
                "stagehand://catalog-status",
                "Catalog Status",
                "Device catalog cache state: populated, item count, categories",
            ),
            raw(
                "stagehand://capabilities",
                "Capabilities",
                "DAW/bridge connectivity, catalog state, tool count, versions",
            ),
        ]
    }

    /// Read a resource by URI.
    pub async fn read(&self, uri: &str) -> Result<String, BridgeError> {
        let value = match uri {
            "stagehand://session" => {
                self.state
                    .pipeline
                    .execute(DawCommand::new("get_session_info"))
                    .await?
            }
            "stagehand://tracks" => {
                self.state
                    .pipeline
                    .execute(DawCommand::new("get_tracks"))
                    .await?
            }
            "stagehand://catalog-status" => {
                serde_json::to_value(self.state.catalog.status())
                    .map_err(|e| BridgeError::Internal(format!("status encode: {}", e)))?
            }
            "stagehand://capabilities" => self.state.capabilities(),
            other => {
                return Err(BridgeError::invalid_input(
                    "uri",
                    format!("unknown resource '{}'", other),
                ))
            }
        };
        serde_json::to_string_pretty(&value)
            .map_err(|e| BridgeError::Internal(format!("resource encode: {}", e)))
    }
}

fn raw(uri: &str, name: &str, description: &str) -> Resource {
    RawResource {
        uri: uri.into(),
        name: name.into(),
        title: Some(name.into()),
        description: Some(description.into()),
        mime_type: Some("application/json".into()),
        size: None,
        icons: None,
    }
    .no_annotation()
}
