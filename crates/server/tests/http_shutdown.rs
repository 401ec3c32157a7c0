mod common;
mod common_mcp;

use common::wait_http_ok;
use common_mcp::McpStreamableHttpSession;
use curl_mcp::config::HttpTransportConfig;
use curl_mcp::http::serve_listener;
use curl_mcp::session_manager::CurlSessionManager;
use curl_mcp_core::{CookieJar, HttpExecutor};
use rmcp::transport::streamable_http_server::session::SessionManager as _;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn cancelling_shutdown_closes_open_sessions() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);

    let sessions = Arc::new(CurlSessionManager::new());
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve_listener(
        listener,
        Arc::new(HttpTransportConfig::default()),
        HttpExecutor::new(CookieJar::new())?,
        sessions.clone(),
        shutdown.clone(),
    ));

    wait_http_ok(&format!("{base_url}/health"), Duration::from_secs(10)).await?;

    let session = McpStreamableHttpSession::connect(&base_url).await?;
    let version = session
        .request(
            1,
            "tools/call",
            json!({"name": "mcp_version", "arguments": {}}),
            Duration::from_secs(10),
        )
        .await?;
    assert!(version.get("result").is_some(), "{version}");
    assert_eq!(sessions.open_session_count(), 1);

    let session_id: Arc<str> = Arc::from(session.session_id());
    assert!(sessions.has_session(&session_id).await?);

    shutdown.cancel();
    let served = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .map_err(|_| anyhow::anyhow!("server did not stop after shutdown"))??;
    assert!(served.is_ok(), "{served:?}");

    assert_eq!(sessions.open_session_count(), 0);
    assert!(!sessions.has_session(&session_id).await?);
    Ok(())
}

#[tokio::test]
async fn shutdown_without_sessions_returns_promptly() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);

    let sessions = Arc::new(CurlSessionManager::new());
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve_listener(
        listener,
        Arc::new(HttpTransportConfig::default()),
        HttpExecutor::new(CookieJar::new())?,
        sessions.clone(),
        shutdown.clone(),
    ));
    wait_http_ok(&format!("{base_url}/health"), Duration::from_secs(10)).await?;

    shutdown.cancel();
    let served = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .map_err(|_| anyhow::anyhow!("server did not stop after shutdown"))??;
    assert!(served.is_ok(), "{served:?}");
    assert_eq!(sessions.open_session_count(), 0);
    Ok(())
}
