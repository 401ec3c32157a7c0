mod common;

use common::{FixtureServer, StdioSession, envelope, tool_text};
use serde_json::json;
use std::time::Duration;

const CALL_TIMEOUT: Duration = Duration::from_secs(20);

#[tokio::test]
async fn stdio_lists_both_tools() -> anyhow::Result<()> {
    let mut session = StdioSession::connect().await?;

    let msg = session
        .request(1, "tools/list", json!({}), CALL_TIMEOUT)
        .await?;
    let tools = msg["result"]["tools"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let names: Vec<&str> = tools
        .iter()
        .filter_map(|t| t.get("name").and_then(serde_json::Value::as_str))
        .collect();
    assert!(names.contains(&"curl_request"), "{names:?}");
    assert!(names.contains(&"mcp_version"), "{names:?}");

    let curl = tools
        .iter()
        .find(|t| t["name"] == "curl_request")
        .expect("curl_request listed");
    let props = &curl["inputSchema"]["properties"];
    for field in [
        "url",
        "method",
        "headers",
        "body",
        "timeout_seconds",
        "response_type",
        "persist_session",
        "follow_redirects",
        "clear_session",
    ] {
        assert!(props.get(field).is_some(), "schema missing {field}: {props}");
    }

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stdio_version_tool_names_transport() -> anyhow::Result<()> {
    let mut session = StdioSession::connect().await?;

    let msg = session
        .request(
            1,
            "tools/call",
            json!({"name": "mcp_version", "arguments": {}}),
            CALL_TIMEOUT,
        )
        .await?;
    assert_eq!(
        tool_text(&msg)?,
        format!(
            "curl-mcp version {} (stdio transport)",
            env!("CARGO_PKG_VERSION")
        )
    );

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stdio_curl_request_returns_envelope_with_context() -> anyhow::Result<()> {
    let fixture = FixtureServer::start().await?;
    let mut session = StdioSession::connect().await?;

    let msg = session
        .request(
            1,
            "tools/call",
            json!({
                "name": "curl_request",
                "arguments": {"url": fixture.url("/json"), "method": "get", "response_type": "json"}
            }),
            CALL_TIMEOUT,
        )
        .await?;
    let env = envelope(&msg)?;

    assert_eq!(env["ok"], json!(true));
    assert_eq!(env["code"], json!(200));
    assert_eq!(env["status"], json!("OK"));
    assert_eq!(env["message"], json!("Request completed successfully."));
    assert_eq!(env["request"]["method"], json!("GET"));
    assert_eq!(env["response"]["body"], json!("{\n  \"a\": 1\n}"));
    assert_eq!(env["context"]["source"], json!("stdio"));
    assert!(env["context"]["request_id"].is_string());
    assert!(env["context"]["timestamp"].is_i64());

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stdio_sessions_share_cookies_across_calls() -> anyhow::Result<()> {
    let fixture = FixtureServer::start().await?;
    let mut session = StdioSession::connect().await?;

    let login = session
        .request(
            1,
            "tools/call",
            json!({
                "name": "curl_request",
                "arguments": {"url": fixture.url("/login"), "method": "GET", "persist_session": true}
            }),
            CALL_TIMEOUT,
        )
        .await?;
    let login = envelope(&login)?;
    assert!(
        login["advice"]
            .as_array()
            .is_some_and(|a| a.iter().any(|s| s == "Cookies returned; persist_session enabled.")),
        "{login}"
    );

    let echo = session
        .request(
            2,
            "tools/call",
            json!({
                "name": "curl_request",
                "arguments": {"url": fixture.url("/echo"), "method": "GET", "persist_session": true}
            }),
            CALL_TIMEOUT,
        )
        .await?;
    let echo = envelope(&echo)?;
    let echoed: serde_json::Value =
        serde_json::from_str(echo["response"]["body"].as_str().unwrap_or_default())?;
    assert_eq!(echoed["headers"]["cookie"], json!("sid=abc123"));

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stdio_network_failure_is_still_a_tool_result() -> anyhow::Result<()> {
    let port = common::pick_unused_port()?;
    let mut session = StdioSession::connect().await?;

    let msg = session
        .request(
            1,
            "tools/call",
            json!({
                "name": "curl_request",
                "arguments": {"url": format!("http://127.0.0.1:{port}/"), "method": "GET"}
            }),
            CALL_TIMEOUT,
        )
        .await?;
    assert!(msg.get("error").is_none(), "{msg}");
    let env = envelope(&msg)?;
    assert_eq!(env["ok"], json!(false));
    assert_eq!(env["status"], json!("error"));
    assert_eq!(env["error_type"], json!("connect_error"));
    assert_eq!(env["size_bytes"], json!(3));

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stdio_rejects_unsupported_method() -> anyhow::Result<()> {
    let mut session = StdioSession::connect().await?;

    let msg = session
        .request(
            1,
            "tools/call",
            json!({
                "name": "curl_request",
                "arguments": {"url": "http://127.0.0.1:1/", "method": "TRACE"}
            }),
            CALL_TIMEOUT,
        )
        .await?;
    let error = msg.get("error").expect("invalid params error");
    assert_eq!(error["code"], json!(-32602));

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stdio_exits_cleanly_when_stdin_closes() -> anyhow::Result<()> {
    let session = StdioSession::connect().await?;
    let status = session.shutdown().await?;
    assert!(status.success(), "{status:?}");
    Ok(())
}
