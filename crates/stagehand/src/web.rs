//! Dashboard HTTP server.
//!
//! Read-only JSON telemetry plus one embedded HTML page, bound to loopback
//! and opt-in via `DASHBOARD_ENABLED`. Nothing here mutates state.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::info;

use crate::state::AppState;

#[derive(Clone)]
pub struct WebState {
    pub app: Arc<AppState>,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/health", get(handle_health))
        .route("/api/status", get(handle_status))
        .route("/api/calls", get(handle_calls))
        .route("/api/tools", get(handle_tools))
        .route("/ui", get(serve_ui))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn run(state: WebState, port: u16) -> anyhow::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("dashboard listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn serve_root() -> impl IntoResponse {
    Json(json!({
        "name": "stagehand",
        "version": crate::VERSION,
        "links": {
            "ui": "/ui",
            "health": "/health",
            "status": "/api/status",
            "calls": "/api/calls",
            "tools": "/api/tools",
        }
    }))
}

async fn handle_health(State(state): State<WebState>) -> impl IntoResponse {
    let app = &state.app;
    Json(json!({
        "status": if app.daw_connected.is_set() { "healthy" } else { "waiting_for_daw" },
        "uptime_secs": app.started_at.elapsed().as_secs(),
        "version": crate::VERSION,
        "connections": {
            "daw": app.daw_connected.is_set(),
            "bridge": app.bridge.is_connected(),
        }
    }))
}

async fn handle_status(State(state): State<WebState>) -> impl IntoResponse {
    let app = &state.app;
    Json(json!({
        "capabilities": app.capabilities(),
        "catalog": app.catalog.status(),
    }))
}

async fn handle_calls(
    State(state): State<WebState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(50)
        .min(200);
    Json(json!({ "calls": state.app.call_log.recent(limit) }))
}

async fn handle_tools(State(state): State<WebState>) -> impl IntoResponse {
    let top: Vec<_> = state
        .app
        .call_log
        .top_tools(20)
        .into_iter()
        .map(|(name, counter)| json!({
            "tool": name,
            "calls": counter.calls,
            "errors": counter.errors,
        }))
        .collect();
    Json(json!({ "tools": top }))
}

async fn serve_ui() -> Html<&'static str> {
    Html(UI_HTML)
}

/// Single-page dashboard; polls the JSON endpoints every 3 seconds.
const UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>stagehand</title>
  <style>
    :root { --bg: #14161f; --card: #1d2130; --accent: #58b368; --warn: #e8a33d; --text: #e8e8ec; --muted: #8a8fa3; }
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: system-ui, -apple-system, sans-serif; background: var(--bg); color: var(--text); padding: 1rem; }
    h1 { font-size: 1.4rem; margin-bottom: 1rem; }
    .grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(260px, 1fr)); gap: 1rem; margin-bottom: 1rem; }
    .card { background: var(--card); border-radius: 8px; padding: 1rem; }
    .card h2 { font-size: 0.85rem; text-transform: uppercase; letter-spacing: 0.05em; color: var(--muted); margin-bottom: 0.5rem; }
    .dot { display: inline-block; width: 0.6rem; height: 0.6rem; border-radius: 50%; margin-right: 0.4rem; }
    .on { background: var(--accent); } .off { background: var(--warn); }
    table { width: 100%; border-collapse: collapse; font-size: 0.85rem; }
    th, td { text-align: left; padding: 0.3rem 0.5rem; border-bottom: 1px solid #2a2f44; }
    th { color: var(--muted); font-weight: 500; }
    .err { color: var(--warn); }
  </style>
</head>
<body>
  <h1>stagehand</h1>
  <div class="grid">
    <div class="card"><h2>Connections</h2><div id="connections">loading…</div></div>
    <div class="card"><h2>Catalog</h2><div id="catalog">loading…</div></div>
    <div class="card"><h2>Top Tools</h2><table id="tools"></table></div>
  </div>
  <div class="card"><h2>Recent Calls</h2><table id="calls"></table></div>
  <script>
    async function tick() {
      try {
        const status = await (await fetch('/api/status')).json();
        const caps = status.capabilities;
        document.getElementById('connections').innerHTML =
          `<div><span class="dot ${caps.daw_connected ? 'on' : 'off'}"></span>DAW command channel</div>` +
          `<div><span class="dot ${caps.bridge_connected ? 'on' : 'off'}"></span>OSC bridge ${caps.bridge_version ? '(v' + caps.bridge_version + ')' : ''}</div>` +
          `<div style="color:var(--muted);margin-top:0.5rem">v${caps.server_version} · ${caps.tool_count} tools · up ${caps.uptime_secs}s</div>`;
        const cat = status.catalog;
        document.getElementById('catalog').innerHTML =
          `<div>${cat.item_count} items ${cat.populating ? '(scanning…)' : ''}</div>` +
          Object.entries(cat.categories || {}).map(([k, v]) => `<div style="color:var(--muted)">${k}: ${v}</div>`).join('');
        const tools = await (await fetch('/api/tools')).json();
        document.getElementById('tools').innerHTML =
          '<tr><th>tool</th><th>calls</th><th>errors</th></tr>' +
          tools.tools.map(t => `<tr><td>${t.tool}</td><td>${t.calls}</td><td class="${t.errors ? 'err' : ''}">${t.errors}</td></tr>`).join('');
        const calls = await (await fetch('/api/calls?limit=25')).json();
        document.getElementById('calls').innerHTML =
          '<tr><th>time</th><th>tool</th><th>args</th><th>ms</th><th>outcome</th></tr>' +
          calls.calls.slice().reverse().map(c =>
            `<tr><td>${c.timestamp.slice(11, 19)}</td><td>${c.tool}</td><td style="color:var(--muted)">${c.args_summary}</td><td>${c.duration_ms}</td><td class="${c.outcome === 'ok' ? '' : 'err'}">${c.outcome}</td></tr>`
          ).join('');
      } catch (e) { /* server restarting; retry on next tick */ }
    }
    tick();
    setInterval(tick, 3000);
  </script>
</body>
</html>
"##;
