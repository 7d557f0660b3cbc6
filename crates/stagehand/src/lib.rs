//! stagehand - MCP bridge daemon for a host DAW.
//!
//! One process, always on the same host as the DAW. The agent speaks MCP
//! over stdio; stagehand multiplexes tool calls onto three DAW transports:
//! a reliable TCP command channel, a fire-and-forget UDP realtime channel,
//! and an OSC-framed deep-parameter bridge. A read-only axum dashboard
//! exposes liveness and telemetry when enabled.

pub mod api;
pub mod catalog;
pub mod config;
pub mod daw;
pub mod mcp;
pub mod prompts;
pub mod readiness;
pub mod resources;
pub mod singleton;
pub mod state;
pub mod stores;
pub mod telemetry;
pub mod web;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
