//! Catalog tools: load-by-name, search, refresh, status.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use stageproto::{BridgeError, DawCommand};

use crate::api::{handler, parse_args, schemas, Needs, ToolOutput, ToolRegistry, ToolSpec};
use crate::catalog::PopulateOutcome;
use crate::state::AppState;

const RESOLVE_WAIT: Duration = Duration::from_secs(5);
const DEFAULT_SEARCH_LIMIT: usize = 25;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: "load_instrument_or_effect",
        description: "Load a device onto a track by catalog name or URI. Names resolve \
                      through the catalog cache; unresolved names pass through to the DAW.",
        schema: schemas::object(
            &[
                ("track_index", schemas::track_index()),
                (
                    "name_or_uri",
                    schemas::string("Device name (e.g. 'Wavetable') or catalog URI"),
                ),
            ],
            &["track_index", "name_or_uri"],
        ),
        needs: Needs::DAW_AND_CATALOG,
        error_prefix: "Failed to load device",
        handler: handler(load_instrument_or_effect),
    });

    registry.register(ToolSpec {
        name: "search_catalog",
        description: "Search the cached device catalog by name substring, optionally \
                      filtered by category.",
        schema: schemas::object(
            &[
                ("query", schemas::string("Name substring to search for")),
                (
                    "category",
                    schemas::string(
                        "Optional category: instruments, drums, sounds, audio_effects, midi_effects",
                    ),
                ),
                ("limit", schemas::integer("Max results (default 25)")),
            ],
            &["query"],
        ),
        needs: Needs {
            daw: false,
            bridge: false,
            catalog: true,
        },
        error_prefix: "Catalog search failed",
        handler: handler(search_catalog),
    });

    registry.register(ToolSpec {
        name: "refresh_catalog",
        description: "Rescan the DAW browser and rebuild the catalog cache. Slow; \
                      runs at most one scan at a time.",
        schema: schemas::object(&[], &[]),
        needs: Needs::DAW,
        error_prefix: "Catalog refresh failed",
        handler: handler(refresh_catalog),
    });

    registry.register(ToolSpec {
        name: "get_catalog_status",
        description: "Report catalog cache state: populated, item count, categories.",
        schema: schemas::object(&[], &[]),
        needs: Needs::NONE,
        error_prefix: "Failed to read catalog status",
        handler: handler(get_catalog_status),
    });
}

#[derive(Deserialize)]
struct LoadDeviceArgs {
    track_index: i64,
    name_or_uri: String,
}

async fn load_instrument_or_effect(
    state: Arc<AppState>,
    args: Value,
) -> Result<ToolOutput, BridgeError> {
    let p: LoadDeviceArgs = parse_args("load_instrument_or_effect", args)?;
    let uri = state.catalog.resolve(&p.name_or_uri, RESOLVE_WAIT).await;
    let result = state
        .pipeline
        .execute(
            DawCommand::new("load_instrument_or_effect")
                .with_param("track_index", p.track_index)
                .with_param("uri", uri.clone()),
        )
        .await?;
    Ok(ToolOutput::with_data(
        format!("Loaded '{}' onto track {}", p.name_or_uri, p.track_index),
        json!({"uri": uri, "result": result}),
    ))
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    category: Option<String>,
    limit: Option<usize>,
}

async fn search_catalog(state: Arc<AppState>, args: Value) -> Result<ToolOutput, BridgeError> {
    let p: SearchArgs = parse_args("search_catalog", args)?;
    if p.query.trim().is_empty() {
        return Err(BridgeError::invalid_input("query", "query is empty"));
    }
    let limit = p.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(200);
    let hits = state.catalog.search(&p.query, p.category.as_deref(), limit);
    let message = if state.catalog.status().populated {
        format!("{} matches for '{}'", hits.len(), p.query)
    } else {
        format!(
            "catalog not populated yet; {} matches for '{}'",
            hits.len(),
            p.query
        )
    };
    Ok(ToolOutput::with_data(
        message,
        json!({"items": hits}),
    ))
}

async fn refresh_catalog(state: Arc<AppState>, _args: Value) -> Result<ToolOutput, BridgeError> {
    match state.catalog.populate(&state.pipeline).await? {
        PopulateOutcome::Completed { items } => Ok(ToolOutput::message(format!(
            "Catalog refreshed: {} items",
            items
        ))),
        PopulateOutcome::AlreadyRunning => Ok(ToolOutput::message(
            "A catalog scan is already running; this request was a no-op",
        )),
    }
}

async fn get_catalog_status(state: Arc<AppState>, _args: Value) -> Result<ToolOutput, BridgeError> {
    let status = state.catalog.status();
    let message = format!(
        "{} items, populated: {}",
        status.item_count, status.populated
    );
    let data = serde_json::to_value(status)
        .map_err(|e| BridgeError::Internal(format!("status encode: {}", e)))?;
    Ok(ToolOutput::with_data(message, data))
}
