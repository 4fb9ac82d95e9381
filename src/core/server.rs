/// MCP Server Implementation
///
/// This module contains the core MCP server implementation including:
/// - JSON-RPC 2.0 request/response structures
/// - Tool registry for managing available tools
/// - Method dispatch shared by both transports
/// - HTTP server setup with Actix Web, behind the API key gate
/// - STDIO server implementation for line-based communication

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, web,
    middleware::{Compress, DefaultHeaders, Logger},
};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::auth::AuthConfig;
use crate::core::config::ServerConfig;
use crate::core::error::{AppError, ToolError};

/// MCP protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

/// Server state shared across all worker threads and both transports.
pub struct AppState {
    /// Server name as reported in MCP initialize responses
    pub server_name: String,
    /// Server version string as reported in MCP initialize responses
    pub server_version: String,
    /// Gate for the MCP endpoints (HTTP only)
    pub auth: AuthConfig,
    /// Total MCP requests accepted over HTTP
    pub requests: AtomicU64,
}

impl AppState {
    pub fn new(name: impl Into<String>, version: impl Into<String>, auth: AuthConfig) -> Self {
        Self {
            server_name: name.into(),
            server_version: version.into(),
            auth,
            requests: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.version.clone(),
            AuthConfig::new(config.api_key.clone()),
        )
    }
}

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is `None` for notifications.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    /// JSON-RPC version identifier, must be "2.0"
    pub jsonrpc: String,
    pub id: Option<Value>,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    pub method: String,
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure for MCP protocol.
///
/// Exactly one of `result` and `error` is present.
#[derive(Serialize, Deserialize, Debug)]
pub struct MCPResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPError>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Deserialize, Debug)]
pub struct MCPError {
    /// JSON-RPC error code (e.g., -32601 for method not found)
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl MCPResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP tool definition structure.
///
/// Each tool must have a unique name, description, and JSON schema defining
/// its input parameters. This structure is serialized when listing tools.
#[derive(Serialize, Debug, Clone)]
pub struct MCPTool {
    /// Unique tool identifier (e.g., "echo", "kv_get")
    pub name: String,
    pub description: String,
    /// JSON Schema defining the tool's input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub type ToolFuture = BoxFuture<'static, Result<Value, ToolError>>;

/// Tool handler function type definition.
///
/// Handlers take the call's JSON arguments and return a boxed future, so a
/// tool can await its external service. A string result is sent to the client
/// verbatim, anything else as serialized JSON.
pub type ToolHandler = Box<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// Registry of available MCP tools.
///
/// The registry maintains a list of tool definitions for discovery and a
/// HashMap of tool names to their handler functions for execution.
#[derive(Default)]
pub struct ToolRegistry {
    /// List of all registered tools (for tools/list method)
    pub tools: Vec<MCPTool>,
    /// Map of tool names to their handler functions (for tools/call method)
    pub handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with the registry.
    ///
    /// Registering a name twice replaces the earlier handler and definition.
    pub fn register(&mut self, tool: MCPTool, handler: ToolHandler) {
        let name = tool.name.clone();
        self.tools.retain(|existing| existing.name != name);
        self.tools.push(tool);
        self.handlers.insert(name, handler);
    }

    /// Run a tool by name. `None` if no such tool is registered.
    pub async fn call(&self, name: &str, arguments: Value) -> Option<Result<Value, ToolError>> {
        let handler = self.handlers.get(name)?;
        Some(handler(arguments).await)
    }
}

/// Route one JSON-RPC request to its MCP method handler.
///
/// Notifications should be filtered out by the transport before calling this.
pub async fn dispatch(state: &AppState, registry: &ToolRegistry, request: MCPRequest) -> MCPResponse {
    let MCPRequest {
        id, method, params, ..
    } = request;

    match method.as_str() {
        "initialize" => MCPResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": state.server_name,
                    "version": state.server_version
                }
            }),
        ),
        "ping" => MCPResponse::success(id, json!({})),
        "tools/list" => MCPResponse::success(id, json!({ "tools": registry.tools })),
        "tools/call" => handle_tools_call(registry, id, params).await,
        _ => MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {method}")),
    }
}

/// Handle MCP tools/call method.
///
/// Tool failures are reported inside a successful response with `isError`
/// set, so the model sees the message; only protocol-level problems (missing
/// params, unknown tool) become JSON-RPC errors.
async fn handle_tools_call(
    registry: &ToolRegistry,
    id: Option<Value>,
    params: Option<Value>,
) -> MCPResponse {
    let Some(params) = params else {
        return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let Some(outcome) = registry.call(tool_name, arguments).await else {
        return MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Unknown tool: {tool_name}"));
    };

    let (text, is_error) = match outcome {
        Ok(Value::String(text)) => (text, false),
        Ok(result) => (serde_json::to_string_pretty(&result).unwrap_or_default(), false),
        Err(e) => {
            warn!(tool = tool_name, error = %e, "tool call failed");
            (format!("Error: {e}"), true)
        }
    };
    debug!(tool = tool_name, is_error, "tool call finished");

    MCPResponse::success(
        id,
        json!({
            "content": [
                {
                    "type": "text",
                    "text": text
                }
            ],
            "isError": is_error
        }),
    )
}

fn health_body() -> Value {
    json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "message": "MCP Server is healthy"
    })
}

/// Used by load balancers and monitoring systems to verify server availability.
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(health_body())
}

/// Unauthenticated landing endpoint describing how to reach the MCP endpoint.
async fn public_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Public endpoint working",
        "mcp_endpoint": "/mcp",
        "api_key_required": "Use Authorization: Bearer YOUR_API_KEY or X-API-Key: YOUR_API_KEY",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn public_ack() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Public POST endpoint working",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// MCP JSON-RPC request handler.
///
/// The API key is checked before the body is parsed, so unauthenticated
/// callers always get a 401 regardless of what they sent.
async fn mcp_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    registry: web::Data<ToolRegistry>,
    body: Bytes,
) -> Result<HttpResponse, AppError> {
    state.auth.authorize(&req)?;
    // Relaxed is enough: the counter is only ever read for reporting.
    state.requests.fetch_add(1, Ordering::Relaxed);

    let request: MCPRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparseable MCP request");
            return Ok(HttpResponse::Ok().json(MCPResponse::failure(
                None,
                PARSE_ERROR,
                format!("Parse error: {e}"),
            )));
        }
    };

    if request.id.is_none() {
        debug!(method = %request.method, "notification accepted");
        return Ok(HttpResponse::Accepted().finish());
    }

    let response = dispatch(&state, &registry, request).await;
    Ok(HttpResponse::Ok().json(response))
}

/// Returns the total number of MCP requests processed since server start.
async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "requests_total": state.requests.load(Ordering::Relaxed),
        "status": "ok"
    }))
}

/// Server-Sent Events endpoint for tools discovery.
///
/// Emits a single `data:` event with every registered tool, in the same shape
/// as a tools/list result plus a count.
async fn sse_tools_discovery(
    req: HttpRequest,
    state: web::Data<AppState>,
    registry: web::Data<ToolRegistry>,
) -> Result<HttpResponse, AppError> {
    use actix_web::http::header;

    state.auth.authorize(&req)?;

    let tools_data = json!({
        "tools": registry.tools,
        "count": registry.tools.len()
    });
    let sse_data = format!(
        "data: {}\n\n",
        serde_json::to_string(&tools_data).unwrap_or_else(|_| "{}".to_string())
    );

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        // Clients must always get the current tool list
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        // Disable nginx buffering for real-time streaming
        .insert_header(("x-accel-buffering", "no"))
        .body(sse_data))
}

/// Register all HTTP routes.
///
/// Expects `web::Data<AppState>` and `web::Data<ToolRegistry>` to be provided
/// as app data.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/api/health", web::get().to(health))
        .route("/api/public", web::get().to(public_info))
        .route("/api/public", web::post().to(public_ack))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/sse", web::get().to(sse_tools_discovery))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(health));
}

/// Run the MCP server in HTTP mode.
///
/// # Configuration
/// The server is configured with:
/// - Worker threads: from config (CPU count capped at 16 by default)
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive: 30 seconds
/// - Request timeout: 30 seconds
/// - Disconnect timeout: 2 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(
    config: &ServerConfig,
    state: Arc<AppState>,
    registry: Arc<ToolRegistry>,
) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let app_state = web::Data::from(state);
    let tool_registry = web::Data::from(registry);

    info!(
        name = %app_state.server_name,
        version = %app_state.server_version,
        bind = %bind_addr,
        workers = config.workers,
        auth = app_state.auth.is_enforced(),
        tools = tool_registry.tools.len(),
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(tool_registry.clone())
            // Enable compression for JSON responses (gzip/brotli)
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(routes)
    })
    .workers(config.workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server in STDIO mode.
///
/// Reads one JSON-RPC request per line from stdin and writes one response per
/// line to stdout. Requests are handled one at a time; notifications get no
/// reply. No API key is required: whoever can spawn the process already owns
/// its stdio.
pub async fn run_server_stdio(state: Arc<AppState>, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

    info!(
        name = %state.server_name,
        version = %state.server_version,
        tools = registry.tools.len(),
        "MCP server starting (STDIO mode)"
    );

    let mut stdin = BufReader::with_capacity(8192, tokio::io::stdin()).lines();
    let mut stdout = BufWriter::with_capacity(8192, tokio::io::stdout());

    while let Some(line) = stdin.next_line().await? {
        let Some(response) = handle_stdio_line(&state, &registry, &line).await else {
            continue;
        };

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                continue;
            }
        };

        // Each response must be on a single line, flushed immediately
        stdout.write_all(response_json.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("stdin closed, STDIO transport stopping");
    Ok(())
}

/// Turn one input line into the response to write, if any.
///
/// Blank lines and notifications produce nothing. Unparseable input produces a
/// parse error only when an `id` can still be recovered from it.
pub async fn handle_stdio_line(
    state: &AppState,
    registry: &ToolRegistry,
    line: &str,
) -> Option<MCPResponse> {
    if line.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<MCPRequest>(line) {
        Ok(request) if request.id.is_none() => {
            debug!(method = %request.method, "notification received");
            None
        }
        Ok(request) => Some(dispatch(state, registry, request).await),
        Err(e) => {
            warn!(error = %e, "parse error on stdin");
            let id = serde_json::from_str::<Value>(line).ok()?.get("id")?.clone();
            Some(MCPResponse::failure(
                Some(id),
                PARSE_ERROR,
                format!("Parse error: {e}"),
            ))
        }
    }
}
