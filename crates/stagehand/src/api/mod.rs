//! Tool registry and dispatch.
//!
//! The registry is a value built once at startup: tool name -> handler,
//! input schema, documentation, declared resource needs, and the error
//! prefix the dispatcher stamps onto failures. The dispatcher is the only
//! caller of handlers and the only producer of response envelopes.

pub mod call_log;
pub mod dispatch;
pub mod responses;
pub mod schemas;
pub mod tools;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use stageproto::BridgeError;

use crate::state::AppState;

/// Resources a tool declares it depends on. The dispatcher prechecks
/// these before the handler runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Needs {
    pub daw: bool,
    pub bridge: bool,
    pub catalog: bool,
}

impl Needs {
    pub const NONE: Needs = Needs {
        daw: false,
        bridge: false,
        catalog: false,
    };
    pub const DAW: Needs = Needs {
        daw: true,
        bridge: false,
        catalog: false,
    };
    pub const BRIDGE: Needs = Needs {
        daw: false,
        bridge: true,
        catalog: false,
    };
    pub const DAW_AND_CATALOG: Needs = Needs {
        daw: true,
        bridge: false,
        catalog: true,
    };
}

/// What a handler returns on success; the dispatcher turns it into the
/// success envelope.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub message: String,
    pub data: Option<Value>,
}

impl ToolOutput {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ToolOutput, BridgeError>> + Send>>;
pub type HandlerFn = Arc<dyn Fn(Arc<AppState>, Value) -> HandlerFuture + Send + Sync>;

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
    pub needs: Needs,
    pub error_prefix: &'static str,
    pub handler: HandlerFn,
}

/// Box an async handler fn into the registry's handler shape.
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Arc<AppState>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput, BridgeError>> + Send + 'static,
{
    Arc::new(move |state, args| -> HandlerFuture { Box::pin(f(state, args)) })
}

/// Parse tool arguments into their typed form; failures are input errors.
pub fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &'static str,
    args: Value,
) -> Result<T, BridgeError> {
    serde_json::from_value(args)
        .map_err(|e| BridgeError::invalid_input("arguments", format!("{}: {}", tool, e)))
}

#[derive(Default)]
pub struct ToolRegistry {
    order: Vec<&'static str>,
    specs: HashMap<&'static str, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) {
        debug_assert!(
            !self.specs.contains_key(spec.name),
            "duplicate tool '{}'",
            spec.name
        );
        self.order.push(spec.name);
        self.specs.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.get(name)
    }

    /// Specs in registration order (stable tool listings).
    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.order.iter().filter_map(|name| self.specs.get(name))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
