#![allow(dead_code)]

use anyhow::Context as _;
use serde_json::json;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines};
use tokio::process::{ChildStdin, ChildStdout};

pub use curl_mcp_test_support::{FixtureServer, KillOnDrop};

pub const BIN: &str = env!("CARGO_BIN_EXE_curl-mcp");

pub fn pick_unused_port() -> anyhow::Result<u16> {
    curl_mcp_test_support::pick_unused_port()
}

pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    curl_mcp_test_support::wait_http_ok(url, timeout_dur).await
}

/// Spawn the server on the HTTP transport bound to `127.0.0.1:{port}`.
pub fn spawn_http(port: u16, extra_args: &[&str]) -> anyhow::Result<Child> {
    Command::new(BIN)
        .arg("--http")
        .arg("--bind")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--log-level")
        .arg("info")
        .args(extra_args)
        .env_remove("MCP_REQUIRE_KEY")
        .env_remove("MCP_API_KEYS")
        .env_remove("MCP_ALLOWED_HOSTS")
        .env_remove("MCP_ALLOWED_ORIGINS")
        .env_remove("CURL_MCP_EXECUTOR_SHARED_SECRET")
        .spawn()
        .context("spawn curl-mcp --http")
}

/// Start the HTTP transport and wait for `/health`.
pub async fn start_http(extra_args: &[&str]) -> anyhow::Result<(String, KillOnDrop)> {
    let port = pick_unused_port()?;
    let child = KillOnDrop(spawn_http(port, extra_args)?);
    let base_url = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base_url}/health"), Duration::from_secs(20)).await?;
    Ok((base_url, child))
}

/// Line-delimited JSON-RPC client for the stdio transport.
pub struct StdioSession {
    child: tokio::process::Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl StdioSession {
    /// Spawn the server on stdio and complete the initialize handshake.
    pub async fn connect() -> anyhow::Result<Self> {
        let mut child = tokio::process::Command::new(BIN)
            .arg("--log-level")
            .arg("warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("spawn curl-mcp (stdio)")?;

        let stdin = child.stdin.take().context("child stdin")?;
        let stdout = child.stdout.take().context("child stdout")?;
        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let init = session
            .request(
                0,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "curl-mcp-integration-tests", "version": "0" }
                }),
                Duration::from_secs(10),
            )
            .await?;
        anyhow::ensure!(init.get("result").is_some(), "initialize failed: {init}");

        session
            .send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;
        Ok(session)
    }

    pub async fn send(&mut self, msg: &serde_json::Value) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(msg)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await.context("write stdin")?;
        self.stdin.flush().await.context("flush stdin")
    }

    /// Send a request and wait for the response with the same id.
    pub async fn request(
        &mut self,
        id: u64,
        method: &str,
        params: serde_json::Value,
        timeout_dur: Duration,
    ) -> anyhow::Result<serde_json::Value> {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .await?;

        tokio::time::timeout(timeout_dur, async {
            loop {
                let line = self
                    .stdout
                    .next_line()
                    .await
                    .context("read stdout")?
                    .context("stdout closed")?;
                let Ok(msg) = serde_json::from_str::<serde_json::Value>(&line) else {
                    anyhow::bail!("non-JSON line on stdout: {line}");
                };
                if msg.get("id") == Some(&json!(id)) {
                    return Ok(msg);
                }
            }
        })
        .await
        .context("timeout waiting for stdio response")?
    }

    /// Close stdin and wait for the process to exit.
    pub async fn shutdown(self) -> anyhow::Result<std::process::ExitStatus> {
        let Self {
            mut child, stdin, ..
        } = self;
        drop(stdin);
        tokio::time::timeout(Duration::from_secs(10), child.wait())
            .await
            .context("timeout waiting for exit")?
            .context("wait for child")
    }
}

/// Parse the envelope JSON from a `tools/call` response.
pub fn envelope(msg: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let text = tool_text(msg)?;
    serde_json::from_str(text).context("tool text is not JSON")
}

/// First text content block of a `tools/call` response.
pub fn tool_text(msg: &serde_json::Value) -> anyhow::Result<&str> {
    msg.get("result")
        .and_then(|r| r.get("content"))
        .and_then(serde_json::Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("text"))
        .and_then(serde_json::Value::as_str)
        .context("tools/call missing result.content[0].text")
}
