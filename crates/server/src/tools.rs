//! MCP tool surface: `curl_request` and `mcp_version`.
//!
//! The same [`CurlMcpServer`] handler backs both transports; only the advertised server name and
//! the `source` recorded in each call context differ.

use curl_mcp_core::{
    CallContext, HeaderList, HttpExecutor, HttpMethod, RequestDescription, ResponseType,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashMap;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which front end a server instance is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl Transport {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }

    #[must_use]
    pub fn server_name(self) -> &'static str {
        match self {
            Self::Stdio => "curl-mcp-stdio",
            Self::Http => "curl-mcp-http",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseTypeArg {
    Text,
    Json,
    Binary,
}

impl From<ResponseTypeArg> for ResponseType {
    fn from(value: ResponseTypeArg) -> Self {
        match value {
            ResponseTypeArg::Text => Self::Text,
            ResponseTypeArg::Json => Self::Json,
            ResponseTypeArg::Binary => Self::Binary,
        }
    }
}

/// Arguments accepted by the `curl_request` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CurlRequestArgs {
    /// Full URL to request (e.g., https://example.com/api).
    pub url: String,
    /// HTTP method: GET, POST, PUT, PATCH, DELETE, HEAD or OPTIONS (case-insensitive).
    pub method: String,
    /// Optional request headers as key/value pairs.
    #[serde(default)]
    #[schemars(with = "Option<HashMap<String, String>>")]
    pub headers: Option<HeaderList>,
    /// Optional raw request body (string).
    #[serde(default)]
    pub body: Option<String>,
    /// Request timeout in seconds (1-120, default 30).
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
    /// How to read the response body: text (default), json or binary (base64).
    #[serde(default)]
    pub response_type: Option<ResponseTypeArg>,
    /// Persist cookies per host across calls in this process (default false).
    #[serde(default)]
    pub persist_session: Option<bool>,
    /// Follow HTTP redirects (default true).
    #[serde(default)]
    pub follow_redirects: Option<bool>,
    /// Clear stored cookies for this host before sending (all hosts if the URL is unparseable).
    #[serde(default)]
    pub clear_session: Option<bool>,
}

impl CurlRequestArgs {
    /// Validate the method and build the request description.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the method is not supported.
    pub fn into_request(self) -> Result<RequestDescription, String> {
        let method: HttpMethod = self.method.parse()?;
        Ok(RequestDescription {
            url: self.url,
            method,
            headers: self.headers,
            body: self.body,
            timeout_seconds: self.timeout_seconds,
            response_type: self.response_type.map(ResponseType::from),
            persist_session: self.persist_session,
            follow_redirects: self.follow_redirects,
            clear_session: self.clear_session,
        })
    }
}

#[derive(Clone)]
pub struct CurlMcpServer {
    executor: HttpExecutor,
    transport: Transport,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CurlMcpServer {
    #[must_use]
    pub fn new(executor: HttpExecutor, transport: Transport) -> Self {
        Self {
            executor,
            transport,
            tool_router: Self::tool_router(),
        }
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Context attached to every `curl_request` envelope.
    #[must_use]
    pub fn call_context(&self) -> CallContext {
        CallContext {
            request_id: Some(uuid::Uuid::new_v4().to_string()),
            source: Some(self.transport.as_str().to_string()),
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
            ..CallContext::default()
        }
    }

    #[tool(
        description = "Perform an HTTP request via a curl-like interface. Returns a JSON envelope with status, headers, body, timing, size, advice and, on failure, a classified error_type."
    )]
    async fn curl_request(
        &self,
        Parameters(args): Parameters<CurlRequestArgs>,
    ) -> Result<CallToolResult, McpError> {
        let request = args
            .into_request()
            .map_err(|msg| McpError::invalid_params(msg, None))?;
        let context = self.call_context();

        let envelope = self.executor.execute(Some(&context), &request).await;
        tracing::info!(
            request_id = context.request_id.as_deref().unwrap_or_default(),
            transport = self.transport.as_str(),
            method = %request.method,
            status = %envelope.status,
            timing_ms = envelope.timing_ms,
            "curl_request completed"
        );

        let text = serde_json::to_string_pretty(&envelope)
            .map_err(|e| McpError::internal_error(format!("serialize envelope: {e}"), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Report the curl-mcp server version and active transport.")]
    async fn mcp_version(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            version_line(self.transport),
        )]))
    }
}

/// `curl-mcp version X (<transport> transport)`.
#[must_use]
pub fn version_line(transport: Transport) -> String {
    format!(
        "curl-mcp version {VERSION} ({} transport)",
        transport.as_str()
    )
}

#[tool_handler]
impl ServerHandler for CurlMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.transport.server_name().to_string(),
                version: VERSION.to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Use curl_request to perform HTTP requests. Set persist_session=true to keep \
                 cookies per host across calls, follow_redirects=false to capture redirects, and \
                 response_type=json|binary to control body decoding."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}
