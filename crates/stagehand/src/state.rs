//! Shared application state.
//!
//! One `Arc<AppState>` wires every subsystem together. Cross-component
//! composition happens through the dispatcher and the handlers; no
//! component reaches into another's internals.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::api::call_log::CallLog;
use crate::catalog::CatalogCache;
use crate::config::Config;
use crate::daw::bridge::{BridgeConfig, OscBridge};
use crate::daw::pipeline::CommandPipeline;
use crate::daw::realtime::RealtimeSender;
use crate::daw::tcp::{TcpClient, TcpConfig};
use crate::readiness::ReadyFlag;
use crate::stores::chains::ChainTemplateStore;
use crate::stores::macros::MacroStore;
use crate::stores::param_maps::ParamMapStore;
use crate::stores::snapshots::SnapshotStore;

pub struct AppState {
    pub config: Config,
    pub started_at: Instant,
    pub daw_connected: ReadyFlag,
    pub catalog_populated: ReadyFlag,
    pub pipeline: CommandPipeline,
    pub realtime: RealtimeSender,
    pub bridge: OscBridge,
    pub catalog: CatalogCache,
    pub snapshots: SnapshotStore,
    pub macros: MacroStore,
    pub param_maps: ParamMapStore,
    pub chains: ChainTemplateStore,
    pub call_log: CallLog,
    /// Set once the registry is built; read by capabilities reporting.
    pub tool_count: AtomicUsize,
}

impl AppState {
    pub async fn build(config: Config) -> Result<Arc<Self>> {
        let daw_connected = ReadyFlag::new();
        let catalog_populated = ReadyFlag::new();

        let tcp = Arc::new(TcpClient::new(
            TcpConfig::loopback(config.tcp_port),
            daw_connected.clone(),
        ));
        let pipeline = CommandPipeline::new(tcp);

        let realtime = RealtimeSender::bind(config.udp_rt_port)
            .await
            .context("binding realtime UDP socket")?;

        let bridge = OscBridge::new(BridgeConfig::loopback(
            config.osc_send_port,
            config.osc_recv_port,
        ));

        let catalog = CatalogCache::new(config.catalog_dir.clone(), catalog_populated.clone());
        let chains = ChainTemplateStore::open(config.catalog_dir.clone());

        Ok(Arc::new(Self {
            config,
            started_at: Instant::now(),
            daw_connected,
            catalog_populated,
            pipeline,
            realtime,
            bridge,
            catalog,
            snapshots: SnapshotStore::new(),
            macros: MacroStore::new(),
            param_maps: ParamMapStore::with_builtins(),
            chains,
            call_log: CallLog::new(),
            tool_count: AtomicUsize::new(0),
        }))
    }

    /// The capabilities report served by the tool, the resource, and the
    /// dashboard. No DAW commands are issued to build it.
    pub fn capabilities(&self) -> Value {
        let catalog = self.catalog.status();
        json!({
            "daw_connected": self.daw_connected.is_set(),
            "bridge_connected": self.bridge.is_connected(),
            "bridge_version": self.bridge.cached_version(),
            "catalog_populated": catalog.populated,
            "catalog_item_count": catalog.item_count,
            "tool_count": self.tool_count.load(Ordering::Relaxed),
            "server_version": crate::VERSION,
            "uptime_secs": self.started_at.elapsed().as_secs(),
        })
    }
}
