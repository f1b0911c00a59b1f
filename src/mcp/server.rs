//! MCP server for assembly BOM extraction and catalog reconciliation.
//!
//! Lifecycle:
//!
//! 1. **Initialisation**: `initialize` request, then the `initialized` notification
//! 2. **Operation**: `tools/list`, `tools/call` and `ping`
//! 3. **Shutdown**: stdin EOF or a termination signal
//!
//! Design tools read assembly snapshots from disk. Catalog tools go through
//! the server's [`Session`], so templates and references stay cached across
//! calls.

use std::error::Error;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::assembly::SnapshotHost;
use crate::bom::{self, BomEntry};
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::transport::StdioTransport;
use crate::report;
use crate::session::Session;
use crate::tree;

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for `initialize`.
    AwaitingInit,
    /// `initialize` answered, waiting for `initialized`.
    Initialising,
    /// Serving requests.
    Running,
    /// Shutting down.
    ShuttingDown,
}

/// Client information sent with `initialize`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters of the `initialize` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by the client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// An entry of the `tools/list` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name.
    pub name: &'static str,
    /// What the tool does.
    pub description: &'static str,
    /// JSON Schema of the arguments.
    pub input_schema: Value,
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Value,
}

/// A content item of a tool result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Returned content.
    pub content: Vec<ToolContent>,
    /// Whether the call failed.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // skip_serializing_if passes &bool
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ToolCallResult {
    /// A successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// A failed text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// A result holding pretty-printed JSON.
    #[must_use]
    pub fn json(value: &Value, is_error: bool) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) if is_error => Self::error(text),
            Ok(text) => Self::text(text),
            Err(e) => Self::error(format!("Failed to serialise result: {e}")),
        }
    }

    /// A structured failure naming the file involved, if any.
    #[must_use]
    pub fn failure(filepath: Option<&str>, error: &(dyn Error + 'static)) -> Self {
        Self::json(
            &json!({
                "status": "error",
                "filepath": filepath,
                "error": report::error_chain(error),
            }),
            true,
        )
    }
}

/// Outcome of a tool handler: the success payload or a ready-made failure.
type ToolOutcome = Result<Value, ToolCallResult>;

/// The MCP server.
pub struct McpServer {
    state: ServerState,
    transport: StdioTransport,
    protocol_version: Option<String>,
    /// Directories that snapshots and exports must live under. Empty allows all.
    allowed_paths: Vec<PathBuf>,
    session: Session,
}

impl McpServer {
    /// Creates a server over stdio.
    #[must_use]
    pub fn new(allowed_paths: Vec<PathBuf>, session: Session) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport: StdioTransport::new(),
            protocol_version: None,
            allowed_paths,
            session,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Protocol version agreed during initialisation.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// The catalog session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Checks that `filepath` lies under an allowed directory.
    ///
    /// Paths that do not exist yet are checked through their parent directory.
    fn validate_path(&self, filepath: &str) -> Result<(), String> {
        if self.allowed_paths.is_empty() {
            return Ok(());
        }

        let path = Path::new(filepath);
        let canonical_path = if path.exists() {
            path.canonicalize()
                .map_err(|e| format!("Failed to resolve path '{}': {e}", path.display()))?
        } else {
            let parent = path.parent().ok_or_else(|| {
                format!("Invalid path '{}': no parent directory", path.display())
            })?;
            let filename = path.file_name().ok_or_else(|| {
                format!("Invalid path '{}': no filename specified", path.display())
            })?;
            let canonical_parent = parent.canonicalize().map_err(|e| {
                format!(
                    "Parent directory '{}' does not exist or is inaccessible: {e}",
                    parent.display()
                )
            })?;
            canonical_parent.join(filename)
        };

        let allowed = self
            .allowed_paths
            .iter()
            .filter_map(|allowed| allowed.canonicalize().ok())
            .any(|allowed| canonical_path.starts_with(allowed));

        if allowed {
            Ok(())
        } else {
            Err("Access denied: path is outside the configured allowed directories".to_string())
        }
    }

    /// Serves requests until stdin closes or a termination signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    #[cfg(unix)]
    pub async fn run(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, shutting down");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line = self.transport.read_line() => {
                    if self.handle_input(line?).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Serves requests until stdin closes or Ctrl+C is pressed.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    #[cfg(windows)]
    pub async fn run(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line = self.transport.read_line() => {
                    if self.handle_input(line?).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles one line of input. Returns `true` once the server should stop.
    async fn handle_input(&mut self, line: Option<String>) -> std::io::Result<bool> {
        let Some(line) = line else {
            tracing::info!("stdin closed, shutting down");
            self.state = ServerState::ShuttingDown;
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        match parse_message(&line) {
            Ok(IncomingMessage::Request(req)) => {
                let reply = self.handle_request(&req);
                match reply {
                    Ok(response) => self.transport.write_message(&response).await?,
                    Err(error) => self.transport.write_message(&error).await?,
                }
            }
            Ok(IncomingMessage::Notification(notif)) => self.handle_notification(&notif),
            Err(error) => self.transport.write_message(&error).await?,
        }

        Ok(self.state == ServerState::ShuttingDown)
    }

    fn handle_request(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        tracing::debug!(id = %req.id, method = %req.method, "Request");

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req),
            "ping" => Ok(JsonRpcResponse::success(req.id.clone(), json!({}))),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        }
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            tracing::info!("Client initialised");
            self.state = ServerState::Running;
        }
    }

    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::invalid_request(
                Some(req.id.clone()),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req.parse_params("initialize")?;
        if let Some(client) = &params.client_info {
            tracing::info!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                requested = %params.protocol_version,
                "Initialising"
            );
        }

        self.protocol_version = Some(MCP_PROTOCOL_VERSION.to_string());
        self.state = ServerState::Initialising;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ))
    }

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": Self::tool_definitions() }),
        ))
    }

    fn handle_tools_call(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        let params: ToolCallParams = req.parse_params("tool call")?;

        let result = self.call_tool(&params.name, &params.arguments);

        let value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(req.id.clone(), "Failed to serialise result")
        })?;
        Ok(JsonRpcResponse::success(req.id.clone(), value))
    }

    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state == ServerState::Running {
            Ok(())
        } else {
            Err(JsonRpcError::invalid_request(
                Some(id.clone()),
                "Server not initialised",
            ))
        }
    }

    /// Runs a tool by name.
    fn call_tool(&mut self, name: &str, arguments: &Value) -> ToolCallResult {
        let outcome = match name {
            "extract_bom" => self.call_extract_bom(arguments),
            "export_bom" => self.call_export_bom(arguments),
            "component_tree" => self.call_component_tree(arguments),
            "ensure_templates" => self.call_ensure_templates(),
            "describe_templates" => Ok(json!({
                "status": "success",
                "templates": self.session.describe_templates(),
            })),
            "resolve_reference" => self.call_resolve_reference(arguments),
            "find_parts" => self.call_find_parts(arguments),
            "bom_catalog_status" => self.call_bom_catalog_status(arguments),
            "link_component" => self.call_link_component(arguments),
            _ => Err(ToolCallResult::error(format!("Unknown tool: {name}"))),
        };

        match outcome {
            Ok(value) => ToolCallResult::json(&value, false),
            Err(failure) => failure,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn tool_definitions() -> Vec<ToolDefinition> {
        let filepath = json!({
            "type": "string",
            "description": "Path to the design snapshot (.json)"
        });

        vec![
            // === Assembly ===
            ToolDefinition {
                name: "extract_bom",
                description: "Extract the bill of materials of a design snapshot. One entry per \
                              distinct component with its instance count and solid volume (cm³). \
                              Returns JSON by default or CSV when format is 'csv'.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "filepath": filepath,
                        "format": {
                            "type": "string",
                            "enum": ["json", "csv"],
                            "description": "Output format (default: json)"
                        }
                    },
                    "required": ["filepath"]
                }),
            },
            ToolDefinition {
                name: "export_bom",
                description: "Write the bill of materials of a design snapshot to a CSV file.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "filepath": filepath,
                        "output_path": {
                            "type": "string",
                            "description": "Path of the CSV file to write"
                        }
                    },
                    "required": ["filepath", "output_path"]
                }),
            },
            ToolDefinition {
                name: "component_tree",
                description: "List every component occurrence of a design snapshot as a flat, \
                              parent-linked tree. The first node is the root component; \
                              parent_ref '#' marks it.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "filepath": filepath },
                    "required": ["filepath"]
                }),
            },
            // === Catalog ===
            ToolDefinition {
                name: "ensure_templates",
                description: "Create any missing metadata parameter templates in the catalog \
                              and refresh the cached template identifiers.",
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            ToolDefinition {
                name: "describe_templates",
                description: "Describe the metadata template set with the cached catalog \
                              identifiers. Makes no catalog calls.",
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            ToolDefinition {
                name: "resolve_reference",
                description: "Resolve a configured catalog reference by logical name \
                              ('part_category' or 'template_parameter').",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "enum": ["part_category", "template_parameter"]
                        }
                    },
                    "required": ["name"]
                }),
            },
            ToolDefinition {
                name: "find_parts",
                description: "Find the catalog parts whose parameters hold the given \
                              identifiers. Each id is reported as found, missing or ambiguous.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "ids": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Identifiers to look up (usually component ids)"
                        }
                    },
                    "required": ["ids"]
                }),
            },
            ToolDefinition {
                name: "bom_catalog_status",
                description: "Extract the bill of materials of a design snapshot and look up \
                              the catalog part of every entry.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "filepath": filepath },
                    "required": ["filepath"]
                }),
            },
            ToolDefinition {
                name: "link_component",
                description: "Write a component's id and volume onto a catalog part. Existing \
                              values are updated in place. Run ensure_templates first.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "filepath": filepath,
                        "component_id": {
                            "type": "string",
                            "description": "Host identifier of the component"
                        },
                        "part": {
                            "type": "integer",
                            "minimum": 0,
                            "description": "Primary key of the catalog part"
                        }
                    },
                    "required": ["filepath", "component_id", "part"]
                }),
            },
        ]
    }

    // ==================== Assembly tools ====================

    fn open_design<'a>(
        &self,
        arguments: &'a Value,
    ) -> Result<(&'a str, SnapshotHost), ToolCallResult> {
        let filepath = required_str(arguments, "filepath")?;
        self.validate_path(filepath).map_err(ToolCallResult::error)?;

        let host =
            SnapshotHost::open(filepath).map_err(|e| ToolCallResult::failure(Some(filepath), &e))?;
        Ok((filepath, host))
    }

    fn load_bom<'a>(
        &self,
        arguments: &'a Value,
    ) -> Result<(&'a str, SnapshotHost, Vec<BomEntry>), ToolCallResult> {
        let (filepath, host) = self.open_design(arguments)?;
        let bom = bom::extract_bom(&host, self.session.sink())
            .map_err(|e| ToolCallResult::failure(Some(filepath), &e))?;
        Ok((filepath, host, bom))
    }

    fn call_extract_bom(&self, arguments: &Value) -> ToolOutcome {
        let format = arguments
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("json")
            .to_lowercase();
        if format != "json" && format != "csv" {
            return Err(ToolCallResult::error(
                "Invalid format. Expected 'json' or 'csv'.",
            ));
        }

        let (filepath, host, bom) = self.load_bom(arguments)?;

        if format == "csv" {
            let csv = bom::to_csv(&bom).map_err(|e| ToolCallResult::failure(Some(filepath), &e))?;
            return Ok(json!({
                "status": "success",
                "filepath": filepath,
                "format": "csv",
                "csv": csv,
                "notices": host.take_notices(),
            }));
        }

        Ok(json!({
            "status": "success",
            "filepath": filepath,
            "entry_count": bom.len(),
            "total_instances": bom::total_instances(&bom),
            "entries": bom,
            "notices": host.take_notices(),
        }))
    }

    fn call_export_bom(&self, arguments: &Value) -> ToolOutcome {
        let output_path = required_str(arguments, "output_path")?;
        self.validate_path(output_path).map_err(ToolCallResult::error)?;

        let (filepath, host, bom) = self.load_bom(arguments)?;
        let csv = bom::to_csv(&bom).map_err(|e| ToolCallResult::failure(Some(filepath), &e))?;
        std::fs::write(output_path, csv)
            .map_err(|e| ToolCallResult::failure(Some(output_path), &e))?;

        tracing::info!(output = %output_path, entries = bom.len(), "Exported BOM");
        Ok(json!({
            "status": "success",
            "filepath": filepath,
            "output_path": output_path,
            "entry_count": bom.len(),
            "notices": host.take_notices(),
        }))
    }

    fn call_component_tree(&self, arguments: &Value) -> ToolOutcome {
        let (filepath, host) = self.open_design(arguments)?;
        let nodes =
            tree::build_tree(&host).map_err(|e| ToolCallResult::failure(Some(filepath), &e))?;

        Ok(json!({
            "status": "success",
            "filepath": filepath,
            "node_count": nodes.len(),
            "nodes": nodes,
            "notices": host.take_notices(),
        }))
    }

    // ==================== Catalog tools ====================

    fn call_ensure_templates(&mut self) -> ToolOutcome {
        let created = self
            .session
            .initialise()
            .map_err(|e| ToolCallResult::failure(None, &e))?;

        Ok(json!({
            "status": "success",
            "created": created,
            "templates": self.session.describe_templates(),
        }))
    }

    fn call_resolve_reference(&mut self, arguments: &Value) -> ToolOutcome {
        let name = required_str(arguments, "name")?;
        let reference = self
            .session
            .resolve_reference_named(name)
            .map_err(|e| ToolCallResult::failure(None, &e))?;

        Ok(json!({
            "status": if reference.is_some() { "found" } else { "missing" },
            "name": name,
            "reference": reference,
        }))
    }

    fn call_find_parts(&mut self, arguments: &Value) -> ToolOutcome {
        let Some(values) = arguments.get("ids").and_then(Value::as_array) else {
            return Err(ToolCallResult::error("Missing required parameter: ids"));
        };
        let ids = values
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ToolCallResult::error("Parameter 'ids' must be an array of strings"))?;

        let results = self
            .session
            .find_parts(&ids)
            .map_err(|e| ToolCallResult::failure(None, &e))?;

        Ok(json!({
            "status": "success",
            "found": results.values().filter(|lookup| lookup.is_found()).count(),
            "results": results,
        }))
    }

    fn call_bom_catalog_status(&mut self, arguments: &Value) -> ToolOutcome {
        let (filepath, host, bom) = self.load_bom(arguments)?;
        let entries = self
            .session
            .catalog_status(&bom)
            .map_err(|e| ToolCallResult::failure(Some(filepath), &e))?;

        Ok(json!({
            "status": "success",
            "filepath": filepath,
            "entry_count": entries.len(),
            "found": entries.iter().filter(|entry| entry.catalog.is_found()).count(),
            "entries": entries,
            "notices": host.take_notices(),
        }))
    }

    fn call_link_component(&mut self, arguments: &Value) -> ToolOutcome {
        let component_id = required_str(arguments, "component_id")?;
        let Some(part) = arguments.get("part").and_then(Value::as_u64) else {
            return Err(ToolCallResult::error("Missing required parameter: part"));
        };

        let (filepath, host, bom) = self.load_bom(arguments)?;
        let Some(entry) = bom.iter().find(|entry| entry.node.local_id == component_id) else {
            return Err(ToolCallResult::json(
                &json!({
                    "status": "error",
                    "filepath": filepath,
                    "error": format!("Component not found in design: {component_id}"),
                    "notices": host.take_notices(),
                }),
                true,
            ));
        };

        let parameters = self
            .session
            .link_component(part, entry)
            .map_err(|e| ToolCallResult::failure(Some(filepath), &e))?;

        Ok(json!({
            "status": "success",
            "filepath": filepath,
            "component_id": component_id,
            "part": part,
            "parameters": parameters,
        }))
    }
}

fn required_str<'a>(arguments: &'a Value, name: &str) -> Result<&'a str, ToolCallResult> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolCallResult::error(format!("Missing required parameter: {name}")))
}
