//! Tracing setup.
//!
//! Logs go to stderr so stdout stays clean for the MCP stdio transport.
//! `LOG_LEVEL` (or `RUST_LOG`) feeds the filter; the default keeps our own
//! crates chatty and everything else at info.

use tracing_subscriber::EnvFilter;

pub fn init(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,stagehand=debug,stageproto=debug")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
