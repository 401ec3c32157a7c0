//! Stdio transport: one MCP session over stdin/stdout.
//!
//! stdout carries protocol frames only; logs go to stderr.

use crate::error::{Result, ServerError};
use crate::tools::{CurlMcpServer, Transport};
use curl_mcp_core::HttpExecutor;
use rmcp::ServiceExt as _;

/// Serve a single MCP session over stdio until the peer disconnects.
///
/// # Errors
///
/// Returns an error if the MCP handshake fails or the session task aborts.
pub async fn serve_stdio(executor: HttpExecutor) -> Result<()> {
    let server = CurlMcpServer::new(executor, Transport::Stdio);
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| ServerError::Startup(format!("stdio handshake failed: {e}")))?;

    tracing::info!("curl-mcp stdio server ready");

    let reason = running
        .waiting()
        .await
        .map_err(|e| ServerError::Runtime(format!("stdio session aborted: {e}")))?;
    tracing::info!(?reason, "stdio session ended");
    Ok(())
}
