use anyhow::Context as _;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::net::TcpListener;
use std::process::Child;
use std::time::{Duration, Instant};

pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails or if the bound socket's
/// local address cannot be read.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status (2xx).
///
/// # Errors
///
/// Returns an error if the timeout elapses before the endpoint returns a success status.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}

/// Local HTTP server with deterministic routes for exercising the executor.
///
/// Routes:
/// - `GET /text`: 20-byte plain text body (`hello from fixture!!`)
/// - `GET /json`: `{"a":1}` as `application/json`
/// - `GET /not-json`: `not json` as `application/json`
/// - `GET /bytes`: five raw bytes as `application/octet-stream`
/// - `GET /bytes-untyped`: the same bytes with no content-type
/// - `GET /redirect`: `302` to `/text`
/// - `GET /login`: sets `sid=abc123; Path=/`
/// - `GET /prefs`: sets `theme=dark` and `sid=rotated`
/// - `ANY /echo`: echoes method, headers, and body as JSON
/// - `GET /slow?ms=N`: waits `N` milliseconds, then answers `slow`
/// - `GET /status/{code}`: empty body with the given status
/// - `GET /health`: `ok`
///
/// The server shuts down when dropped.
pub struct FixtureServer {
    base_url: String,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

pub const FIXTURE_TEXT: &str = "hello from fixture!!";
pub const FIXTURE_BYTES: [u8; 5] = [0x00, 0x01, 0x7f, 0xfe, 0xff];

impl FixtureServer {
    /// Bind `127.0.0.1:0` and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind fixture listener")?;
        let addr = listener.local_addr().context("fixture local_addr")?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(listener, fixture_router()).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }
}

fn fixture_router() -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/text", get(|| async { FIXTURE_TEXT }))
        .route("/json", get(|| async { json_response(r#"{"a":1}"#) }))
        .route("/not-json", get(|| async { json_response("not json") }))
        .route("/bytes", get(bytes_typed))
        .route("/bytes-untyped", get(bytes_untyped))
        .route("/redirect", get(redirect))
        .route("/login", get(login))
        .route("/prefs", get(prefs))
        .route("/echo", any(echo))
        .route("/slow", get(slow))
        .route("/status/{code}", get(status))
}

fn json_response(body: &'static str) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn bytes_typed() -> Response {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        FIXTURE_BYTES.to_vec(),
    )
        .into_response()
}

async fn bytes_untyped() -> Response {
    // Built by hand: tuple responses would add a content-type.
    Response::new(Body::from(FIXTURE_BYTES.to_vec()))
}

async fn redirect() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/text")]).into_response()
}

async fn login() -> Response {
    ([(header::SET_COOKIE, "sid=abc123; Path=/")], "logged in").into_response()
}

async fn prefs() -> Response {
    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        header::HeaderValue::from_static("theme=dark; Path=/"),
    );
    headers.append(
        header::SET_COOKIE,
        header::HeaderValue::from_static("sid=rotated; HttpOnly"),
    );
    (headers, "prefs saved").into_response()
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> axum::Json<Value> {
    let mut echoed = Map::new();
    for (name, value) in &headers {
        echoed.insert(
            name.as_str().to_string(),
            Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        );
    }
    axum::Json(json!({
        "method": method.as_str(),
        "headers": echoed,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn slow(Query(q): Query<HashMap<String, u64>>) -> &'static str {
    let ms = q.get("ms").copied().unwrap_or(2_000);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "slow"
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}
