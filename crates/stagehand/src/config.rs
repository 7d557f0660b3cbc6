//! Environment-driven configuration.
//!
//! Everything binds to loopback; the environment only moves ports and
//! toggles the dashboard. Invalid values are a startup error so a typo'd
//! port fails fast instead of silently binding somewhere else.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Default ports match the in-DAW scripting endpoints.
pub const DEFAULT_TCP_PORT: u16 = 9877;
pub const DEFAULT_UDP_RT_PORT: u16 = 9882;
pub const DEFAULT_OSC_SEND_PORT: u16 = 9878;
pub const DEFAULT_OSC_RECV_PORT: u16 = 9879;
pub const DEFAULT_SENTINEL_PORT: u16 = 9881;
pub const DEFAULT_DASHBOARD_PORT: u16 = 9880;

#[derive(Debug, Clone)]
pub struct Config {
    pub tcp_port: u16,
    pub udp_rt_port: u16,
    pub osc_send_port: u16,
    pub osc_recv_port: u16,
    pub sentinel_port: u16,
    pub dashboard_enabled: bool,
    pub dashboard_port: u16,
    pub catalog_dir: PathBuf,
    pub log_level: Option<String>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tcp_port: port_var("TCP_PORT", DEFAULT_TCP_PORT)?,
            udp_rt_port: port_var("UDP_RT_PORT", DEFAULT_UDP_RT_PORT)?,
            osc_send_port: port_var("OSC_SEND_PORT", DEFAULT_OSC_SEND_PORT)?,
            osc_recv_port: port_var("OSC_RECV_PORT", DEFAULT_OSC_RECV_PORT)?,
            sentinel_port: port_var("SENTINEL_PORT", DEFAULT_SENTINEL_PORT)?,
            dashboard_enabled: bool_var("DASHBOARD_ENABLED"),
            dashboard_port: port_var("DASHBOARD_PORT", DEFAULT_DASHBOARD_PORT)?,
            catalog_dir: catalog_dir()?,
            log_level: std::env::var("LOG_LEVEL").ok(),
        })
    }
}

fn port_var(name: &str, default: u16) -> Result<u16> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u16>()
            .with_context(|| format!("{} must be a port number, got '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

fn bool_var(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("yes") | Ok("on")
    )
}

fn catalog_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CATALOG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(base) = directories::BaseDirs::new() {
        return Ok(base.data_local_dir().join("stagehand"));
    }
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home).join(".local/share/stagehand"));
    }
    bail!("cannot determine a catalog directory; set CATALOG_DIR");
}
