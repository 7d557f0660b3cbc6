//! The MCP server surface.
//!
//! Implements `rmcp::ServerHandler` by hand so everything flows through the
//! registry and dispatcher: `tools/list` reads the registry, `tools/call`
//! goes through the dispatcher and returns the uniform envelope as text.
//! Error envelopes are successful MCP results with `is_error` set - the
//! agent sees the structured error, not a protocol failure.

use std::sync::Arc;

use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, GetPromptRequestParam, GetPromptResult,
        ListPromptsResult, ListResourcesResult, ListToolsResult, PaginatedRequestParam,
        ReadResourceRequestParam, ReadResourceResult, ResourceContents, ServerCapabilities,
        ServerInfo, Tool,
    },
    service::{RequestContext, RoleServer},
    ErrorData as McpError, ServerHandler,
};
use serde_json::Value;

use crate::api::dispatch::Dispatcher;
use crate::prompts::{args_to_hashmap, PromptRegistry};
use crate::resources::ResourceRegistry;

#[derive(Clone)]
pub struct BridgeServer {
    dispatcher: Arc<Dispatcher>,
    resources: Arc<ResourceRegistry>,
}

impl BridgeServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let resources = Arc::new(ResourceRegistry::new(Arc::clone(dispatcher.state())));
        Self {
            dispatcher,
            resources,
        }
    }

    fn tool_listing(&self) -> Vec<Tool> {
        self.dispatcher
            .registry()
            .iter()
            .map(|spec| {
                let schema = match &spec.schema {
                    Value::Object(map) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                Tool::new(spec.name, spec.description, Arc::new(schema))
            })
            .collect()
    }
}

impl ServerHandler for BridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "stagehand bridges this agent to a running DAW. Tools issue DAW commands \
                 over a paced, retried command channel; deep device parameters go through \
                 the OSC bridge; resources expose session/catalog/capability state; \
                 prompts hold common workflows. Check stagehand://capabilities first if \
                 a tool reports the DAW or bridge as not ready."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_listing(),
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request
            .arguments
            .map(Value::Object)
            .unwrap_or_else(|| Value::Object(Default::default()));

        let envelope = self.dispatcher.dispatch(&request.name, args).await;
        let is_error = envelope.get("status").and_then(Value::as_str) == Some("error");
        let text = serde_json::to_string_pretty(&envelope).unwrap_or_default();

        if is_error {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: ResourceRegistry::list(),
            ..Default::default()
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self
            .resources
            .read(&request.uri)
            .await
            .map_err(|e| McpError::resource_not_found(e.to_string(), None))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            prompts: PromptRegistry::list(),
            ..Default::default()
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let args = args_to_hashmap(request.arguments.as_ref());
        PromptRegistry::get(&request.name, &args)
    }
}
