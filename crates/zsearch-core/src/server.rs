//! Model Context Protocol server over stdio
//!
//! Speaks JSON-RPC 2.0, one message per line, and exposes a single
//! `web-search` tool backed by a [`SearchBackend`]. Stdout carries protocol
//! traffic only; logging goes to stderr.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use zsearch_api::{
    types::{MAX_COUNT, MAX_QUERY_CHARS, MIN_COUNT},
    ApiError, ContentSize, RecencyFilter, SearchEngine, WebSearchRequest,
};

use crate::config::SearchDefaults;
use crate::search::SearchBackend;
use crate::{Error, Result};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const TOOL_NAME: &str = "web-search";
const SERVER_NAME: &str = "zsearch";

// JSON-RPC error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Arguments accepted by the `web-search` tool
#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default)]
    search_engine: Option<SearchEngine>,
    #[serde(default)]
    count: Option<u32>,
    #[serde(default)]
    search_domain_filter: Option<String>,
    #[serde(default)]
    search_recency_filter: Option<RecencyFilter>,
    #[serde(default)]
    content_size: Option<ContentSize>,
}

pub struct ToolServer {
    backend: Box<dyn SearchBackend>,
    defaults: SearchDefaults,
}

impl ToolServer {
    pub fn new(backend: Box<dyn SearchBackend>, defaults: SearchDefaults) -> Self {
        Self { backend, defaults }
    }

    /// Serve on the process's stdin/stdout until stdin closes
    pub async fn serve_stdio(&self) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        info!("Web search tool server started on stdio");
        self.run(stdin, stdout).await
    }

    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if let Some(reply) = self.handle_line(&line).await {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle one line of input; `None` means nothing should be written back
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => {
                warn!("Unparsable message: {}", e);
                Some(RpcResponse::failure(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)))
            }
            Ok(Value::Object(obj)) if !obj.contains_key("method") => {
                // A reply to something we never send; nothing to do
                debug!("Ignoring message without a method");
                None
            }
            Ok(Value::Object(obj)) => {
                // `"id": null` is still a request, not a notification
                let has_id = obj.contains_key("id");
                match serde_json::from_value::<RpcRequest>(Value::Object(obj)) {
                    Ok(mut request) => {
                        if has_id && request.id.is_none() {
                            request.id = Some(Value::Null);
                        }
                        self.handle(request).await
                    }
                    Err(e) => Some(RpcResponse::failure(
                        Value::Null,
                        INVALID_REQUEST,
                        format!("Invalid request: {}", e),
                    )),
                }
            }
            Ok(_) => Some(RpcResponse::failure(
                Value::Null,
                INVALID_REQUEST,
                "Invalid request: expected a JSON object",
            )),
        }?;

        match serde_json::to_string(&response) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Failed to serialize response: {}", e);
                None
            }
        }
    }

    async fn handle(&self, request: RpcRequest) -> Option<RpcResponse> {
        debug!(method = %request.method, "Handling request");

        let Some(id) = request.id else {
            // Notifications never get a reply
            debug!("Notification: {}", request.method);
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize(&request.params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": [tool_definition()] })),
            "tools/call" => self.call_tool(request.params).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        Some(match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err((code, message)) => RpcResponse::failure(id, code, message),
        })
    }

    fn initialize(&self, params: &Value) -> Value {
        let requested = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        if let Some(client) = params.get("clientInfo").and_then(|c| c.get("name")) {
            info!("Client connected: {}", client);
        }

        json!({
            "protocolVersion": requested,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    async fn call_tool(&self, params: Value) -> std::result::Result<Value, (i64, String)> {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        if name != TOOL_NAME {
            return Err((INVALID_PARAMS, format!("Unknown tool: {}", name)));
        }

        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        let args: WebSearchArgs = serde_json::from_value(arguments)
            .map_err(|e| (INVALID_PARAMS, format!("Invalid arguments: {}", e)))?;

        let request = self.build_request(args);
        if let Err(e) = request.validate() {
            return Err((INVALID_PARAMS, e.to_string()));
        }

        match self.backend.search(&request).await {
            Ok(raw) => {
                let text = serde_json::to_string_pretty(&raw)
                    .map_err(|e| (INVALID_REQUEST, format!("Unserializable response: {}", e)))?;
                Ok(json!({
                    "content": [{ "type": "text", "text": text }],
                }))
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                Ok(json!({
                    "content": [{ "type": "text", "text": failure_text(&e) }],
                    "isError": true,
                }))
            }
        }
    }

    fn build_request(&self, args: WebSearchArgs) -> WebSearchRequest {
        WebSearchRequest::new(args.query)
            .engine(args.search_engine.unwrap_or(self.defaults.engine))
            .count(args.count.unwrap_or(self.defaults.count))
            .recency(args.search_recency_filter.unwrap_or(self.defaults.recency))
            .content_size(args.content_size.unwrap_or(self.defaults.content_size))
            .domain(args.search_domain_filter)
    }
}

fn failure_text(err: &Error) -> String {
    match err {
        Error::Api(ApiError::RequestFailed { status, message }) => {
            format!("Search failed: {} {}", status, message)
        }
        Error::Api(api) => match api.status() {
            Some(status) => format!("Search failed: {} {}", status, api),
            None => format!("Search failed: {}", api),
        },
        other => format!("Search failed: {}", other),
    }
}

/// Tool listing entry, including the JSON schema of its arguments
pub fn tool_definition() -> Value {
    let engines: Vec<&str> = SearchEngine::ALL.iter().map(|e| e.as_str()).collect();
    let engine_help: Vec<String> = SearchEngine::ALL
        .iter()
        .map(|e| format!("{} ({})", e.as_str(), e.description()))
        .collect();
    let recency: Vec<&str> = RecencyFilter::ALL.iter().map(|r| r.as_str()).collect();

    json!({
        "name": TOOL_NAME,
        "description": "Search the web with the Zhipu BigModel Web Search API",
        "inputSchema": {
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "maxLength": MAX_QUERY_CHARS,
                    "description": format!("What to search for; keep it under {} characters", MAX_QUERY_CHARS),
                },
                "search_engine": {
                    "type": "string",
                    "enum": engines,
                    "default": SearchEngine::default().as_str(),
                    "description": format!("Search engine to use: {}", engine_help.join(", ")),
                },
                "count": {
                    "type": "integer",
                    "minimum": MIN_COUNT,
                    "maximum": MAX_COUNT,
                    "default": zsearch_api::types::DEFAULT_COUNT,
                    "description": "Number of results. search_pro_sogou only accepts 10, 20, 30, 40 or 50",
                },
                "search_domain_filter": {
                    "type": "string",
                    "description": "Only return results from this domain, e.g. 'www.example.com'",
                },
                "search_recency_filter": {
                    "type": "string",
                    "enum": recency,
                    "default": RecencyFilter::default().as_str(),
                    "description": "Only return pages published within this window",
                },
                "content_size": {
                    "type": "string",
                    "enum": ["medium", "high"],
                    "default": ContentSize::default().as_str(),
                    "description": "Summary length per result: medium (~400-600 chars) or high (~2500 chars). Use medium unless more detail is needed",
                },
            },
            "required": ["query"],
            "additionalProperties": false,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MockSearchBackend;

    fn server_with(mock: MockSearchBackend) -> ToolServer {
        ToolServer::new(Box::new(mock), SearchDefaults::default())
    }

    async fn call(server: &ToolServer, msg: Value) -> Value {
        let reply = server
            .handle_line(&msg.to_string())
            .await
            .expect("expected a reply");
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server_with(MockSearchBackend::new());
        let reply = call(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize",
                "params": {"protocolVersion": "2025-03-26", "clientInfo": {"name": "test"}}
            }),
        )
        .await;

        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(reply["result"]["serverInfo"]["name"], "zsearch");
        assert!(reply["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let server = server_with(MockSearchBackend::new());
        let reply = server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(reply.is_none());
        assert!(server.handle_line("   ").await.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let server = server_with(MockSearchBackend::new());
        let reply = call(&server, json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"})).await;

        let tools = reply["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], TOOL_NAME);
        let props = &tools[0]["inputSchema"]["properties"];
        assert_eq!(props["search_engine"]["default"], "search_pro");
        assert_eq!(props["search_engine"]["enum"].as_array().unwrap().len(), 6);
        assert_eq!(props["search_recency_filter"]["default"], "noLimit");
        assert_eq!(props["count"]["maximum"], 50);
    }

    #[tokio::test]
    async fn test_tool_call_applies_defaults() {
        let mut mock = MockSearchBackend::new();
        mock.expect_search()
            .withf(|req| {
                req.search_query == "rust"
                    && req.search_engine == SearchEngine::Pro
                    && req.count == 10
                    && req.search_recency_filter == RecencyFilter::OneWeek
                    && req.search_domain_filter.as_deref() == Some("www.rust-lang.org")
                    && !req.search_intent
            })
            .times(1)
            .returning(|_| Ok(json!({"id": "x", "search_result": []})));

        let server = server_with(mock);
        let reply = call(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 7, "method": "tools/call",
                "params": {
                    "name": "web-search",
                    "arguments": {
                        "query": "rust",
                        "search_recency_filter": "oneWeek",
                        "search_domain_filter": "www.rust-lang.org"
                    }
                }
            }),
        )
        .await;

        let content = &reply["result"]["content"][0];
        assert_eq!(content["type"], "text");
        let echoed: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        assert_eq!(echoed["id"], "x");
        assert!(reply["result"].get("isError").is_none());
    }

    #[tokio::test]
    async fn test_tool_call_upstream_failure_is_tool_error() {
        let mut mock = MockSearchBackend::new();
        mock.expect_search().times(1).returning(|_| {
            Err(Error::Api(ApiError::RequestFailed {
                status: 500,
                message: "internal".into(),
            }))
        });

        let server = server_with(mock);
        let reply = call(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 2, "method": "tools/call",
                "params": {"name": "web-search", "arguments": {"query": "q"}}
            }),
        )
        .await;

        assert_eq!(reply["result"]["isError"], true);
        assert_eq!(reply["result"]["content"][0]["text"], "Search failed: 500 internal");
        assert!(reply.get("error").is_none());
    }

    #[test]
    fn test_failure_text_names_status() {
        let cases = [
            (
                ApiError::Unauthorized { status: 401, message: "bad key".into() },
                "Search failed: 401 Authentication failed: bad key",
            ),
            (
                ApiError::RateLimited("slow down".into()),
                "Search failed: 429 Rate limit exceeded: slow down",
            ),
            (
                ApiError::BadRequest("count out of range".into()),
                "Search failed: 400 Search request rejected: count out of range",
            ),
            (ApiError::Timeout, "Search failed: Request timed out"),
        ];

        for (err, expected) in cases {
            assert_eq!(failure_text(&Error::Api(err)), expected);
        }
    }

    #[tokio::test]
    async fn test_null_id_gets_a_reply() {
        let server = server_with(MockSearchBackend::new());
        let reply = call(&server, json!({"jsonrpc": "2.0", "id": null, "method": "ping"})).await;

        assert_eq!(reply["id"], Value::Null);
        assert!(reply["result"].is_object());
    }

    #[tokio::test]
    async fn test_tool_call_invalid_arguments() {
        let mut mock = MockSearchBackend::new();
        mock.expect_search().times(0);
        let server = server_with(mock);

        let long_query = "x".repeat(MAX_QUERY_CHARS + 1);
        for args in [
            json!({}),
            json!({"query": "q", "count": 0}),
            json!({"query": "q", "search_engine": "google"}),
            json!({"query": long_query}),
        ] {
            let reply = call(
                &server,
                json!({
                    "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                    "params": {"name": "web-search", "arguments": args.clone()}
                }),
            )
            .await;
            assert_eq!(reply["error"]["code"], INVALID_PARAMS, "args: {}", args);
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_and_method() {
        let server = server_with(MockSearchBackend::new());

        let reply = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "fetch"}}),
        )
        .await;
        assert_eq!(reply["error"]["code"], INVALID_PARAMS);

        let reply = call(&server, json!({"jsonrpc": "2.0", "id": 5, "method": "resources/list"})).await;
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let server = server_with(MockSearchBackend::new());
        let reply: Value = serde_json::from_str(&server.handle_line("{not json").await.unwrap()).unwrap();
        assert_eq!(reply["error"]["code"], PARSE_ERROR);
        assert_eq!(reply["id"], Value::Null);

        let reply: Value = serde_json::from_str(&server.handle_line("[1, 2]").await.unwrap()).unwrap();
        assert_eq!(reply["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_run_over_stream() {
        let mut mock = MockSearchBackend::new();
        mock.expect_search()
            .times(1)
            .returning(|_| Ok(json!({"search_result": [{"link": "https://a.example"}]})));
        let server = server_with(mock);

        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}).to_string(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "web-search", "arguments": {"query": "a"}}})
            .to_string(),
        ]
        .join("\n");

        let mut output = Vec::new();
        server
            .run(tokio::io::BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(replies[1]["id"], 2);
        assert!(replies[1]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("https://a.example"));
    }
}
