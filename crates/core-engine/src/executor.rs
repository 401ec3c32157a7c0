//! The request executor.
//!
//! One call to [`HttpExecutor::execute`] performs exactly one HTTP exchange (no retries) under a
//! deadline and returns a [`ResponseEnvelope`]. Failures never escape: they are classified and
//! folded into the envelope.

use crate::cookies::{CookieJar, parse_set_cookie};
use crate::failure::{FailureKind, classify_failure, describe_error};
use crate::headers::HeaderList;
use crate::model::{
    CallContext, ReceivedResponse, RequestDescription, RequestEcho, ResponseDetails,
    ResponseEnvelope, ResponseType,
};
use base64::Engine as _;
use reqwest::header::{CONTENT_TYPE, HeaderMap, SET_COOKIE};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_USER_AGENT: &str = concat!("curl-mcp/", env!("CARGO_PKG_VERSION"));

const ADVICE_JSON_PARSE_FAILED: &str = "JSON parse failed; body returned as text.";
const ADVICE_COOKIES_PERSISTED: &str = "Cookies returned; persist_session enabled.";
const ADVICE_SESSION_CLEARED: &str = "Session cookies cleared before request.";
const ADVICE_BINARY_NO_CONTENT_TYPE: &str =
    "Binary response returned without content-type header.";
const ADVICE_REDIRECT_CAPTURED: &str =
    "Redirect captured because follow_redirects=false; check Location header.";
const ADVICE_RETRY_TIMEOUT: &str = "Increase timeout_seconds or retry later.";
const ADVICE_VERIFY_REQUEST: &str = "Verify the URL and request parameters.";
const ADVICE_INSPECT: &str = "Inspect response details for next steps.";

#[derive(Debug, Error)]
pub enum HttpExecError {
    #[error("config error: {0}")]
    Config(String),
    #[error("Request timed out")]
    Timeout,
    #[error("{0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, HttpExecError>;

impl From<reqwest::Error> for HttpExecError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(describe_error(value))
    }
}

/// Executes request descriptions against the network.
///
/// Cheap to clone; clones share the HTTP clients and the cookie jar.
#[derive(Clone)]
pub struct HttpExecutor {
    inner: Arc<HttpExecutorInner>,
}

struct HttpExecutorInner {
    following: Client,
    manual: Client,
    jar: CookieJar,
    user_agent: String,
}

/// What came back from the wire, before it is shaped into an envelope.
struct Exchange {
    status: StatusCode,
    headers: HeaderList,
    content_type: Option<String>,
    set_cookies: Vec<String>,
    body: MaterializedBody,
}

enum MaterializedBody {
    Text(String),
    Binary { base64: String, len: usize },
}

impl MaterializedBody {
    fn byte_len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary { len, .. } => *len,
        }
    }
}

impl HttpExecutor {
    /// Build an executor that reads and writes `jar`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP clients cannot be constructed (e.g. the TLS
    /// backend fails to initialize).
    pub fn new(jar: CookieJar) -> Result<Self> {
        Self::with_user_agent(jar, DEFAULT_USER_AGENT)
    }

    /// Like [`HttpExecutor::new`], with a custom default `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP clients cannot be constructed.
    pub fn with_user_agent(jar: CookieJar, user_agent: impl Into<String>) -> Result<Self> {
        let following = build_client(reqwest::redirect::Policy::default())?;
        let manual = build_client(reqwest::redirect::Policy::none())?;
        Ok(Self {
            inner: Arc::new(HttpExecutorInner {
                following,
                manual,
                jar,
                user_agent: user_agent.into(),
            }),
        })
    }

    #[must_use]
    pub fn cookie_jar(&self) -> &CookieJar {
        &self.inner.jar
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    /// Perform the request and return its envelope.
    ///
    /// Side effects, in order:
    /// 1. `clear_session` clears the host's cookies (all cookies if the host is unknown), even
    ///    if the request later fails.
    /// 2. The default `User-Agent` and, with `persist_session`, the stored `Cookie` header are
    ///    added unless the caller already supplied them.
    /// 3. On a received response with `persist_session`, `Set-Cookie` values are merged into the
    ///    host's jar entry.
    pub async fn execute(
        &self,
        context: Option<&CallContext>,
        request: &RequestDescription,
    ) -> ResponseEnvelope {
        let echo = RequestEcho::from(request);
        let host = request.host();
        let mut advice: Vec<String> = Vec::new();

        if echo.clear_session {
            self.inner.jar.clear(host.as_deref());
            debug!(host = host.as_deref().unwrap_or("*"), "session cookies cleared");
        }

        let headers = self.outgoing_headers(request, host.as_deref(), echo.persist_session);

        debug!(
            method = %echo.method,
            host = host.as_deref().unwrap_or("<unknown>"),
            timeout_secs = echo.timeout_seconds,
            response_type = ?echo.response_type,
            "executing http request"
        );

        let started = Instant::now();
        let outcome = match tokio::time::timeout(
            request.effective_timeout(),
            self.exchange(request, &echo, headers, &mut advice),
        )
        .await
        {
            Ok(result) => result,
            // Dropping the exchange future aborts the in-flight request.
            Err(_elapsed) => Err(HttpExecError::Timeout),
        };
        let elapsed = started.elapsed();

        let request_body_len = request.body.as_deref().map_or(0, str::len);

        let mut envelope = match outcome {
            Ok(exchange) => {
                debug!(
                    status = exchange.status.as_u16(),
                    elapsed_ms = rounded_millis(elapsed),
                    "http request completed"
                );
                self.received_envelope(
                    exchange,
                    echo,
                    host.as_deref(),
                    elapsed,
                    request_body_len,
                    advice,
                )
            }
            Err(err) => failed_envelope(&err, echo, request_body_len, advice),
        };

        envelope.context = context.cloned();
        if !envelope.ok && envelope.advice.is_empty() {
            envelope.advice.push(ADVICE_INSPECT.to_string());
        }
        envelope
    }

    fn outgoing_headers(
        &self,
        request: &RequestDescription,
        host: Option<&str>,
        persist_session: bool,
    ) -> HeaderList {
        let mut headers = request.headers.clone().unwrap_or_default();
        if !headers.contains("user-agent") {
            headers.append("User-Agent", self.inner.user_agent.as_str());
        }
        if persist_session
            && !headers.contains("cookie")
            && let Some(cookie) = host.and_then(|h| self.inner.jar.cookie_header(h))
        {
            headers.append("Cookie", cookie);
        }
        headers
    }

    async fn exchange(
        &self,
        request: &RequestDescription,
        echo: &RequestEcho,
        headers: HeaderList,
        advice: &mut Vec<String>,
    ) -> Result<Exchange> {
        let client = if echo.follow_redirects {
            &self.inner.following
        } else {
            &self.inner.manual
        };

        let mut builder = client.request(echo.method.into(), request.url.as_str());
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers = collect_headers(response.headers());
        let set_cookies = collect_set_cookies(response.headers());

        // `bytes()` consumes the response, so the body cannot be read twice.
        let bytes = response.bytes().await?;
        let body = materialize_body(&bytes, echo.response_type, advice);

        Ok(Exchange {
            status,
            headers,
            content_type,
            set_cookies,
            body,
        })
    }

    fn received_envelope(
        &self,
        exchange: Exchange,
        echo: RequestEcho,
        host: Option<&str>,
        elapsed: Duration,
        request_body_len: usize,
        mut advice: Vec<String>,
    ) -> ResponseEnvelope {
        let Exchange {
            status,
            headers,
            content_type,
            set_cookies,
            body,
        } = exchange;
        let code = status.as_u16();

        if echo.persist_session && !set_cookies.is_empty() {
            if let Some(host) = host {
                let parsed = set_cookies
                    .iter()
                    .map(String::as_str)
                    .filter_map(parse_set_cookie);
                self.inner.jar.store(host, parsed);
            }
            advice.push(ADVICE_COOKIES_PERSISTED.to_string());
        }
        if echo.clear_session {
            advice.push(ADVICE_SESSION_CLEARED.to_string());
        }
        if echo.response_type == ResponseType::Binary && content_type.is_none() {
            advice.push(ADVICE_BINARY_NO_CONTENT_TYPE.to_string());
        }
        if !echo.follow_redirects && status.is_redirection() {
            advice.push(ADVICE_REDIRECT_CAPTURED.to_string());
        }

        // Keyed on 2xx; `ok` covers every received status.
        let message = if status.is_success() {
            "Request completed successfully.".to_string()
        } else {
            format!("Request failed with status {code}.")
        };

        let size_bytes = as_u64(request_body_len.saturating_add(body.byte_len()));
        let (body, body_base64) = match body {
            MaterializedBody::Text(text) => (Some(text), None),
            MaterializedBody::Binary { base64, .. } => (None, Some(base64)),
        };
        let status_text = status.canonical_reason().unwrap_or_default().to_string();

        ResponseEnvelope {
            ok: true,
            code: Some(code),
            status: status_text.clone(),
            message,
            timing_ms: Some(rounded_millis(elapsed)),
            size_bytes,
            request: echo,
            response: ResponseDetails::Received(ReceivedResponse {
                status_code: code,
                status_text,
                headers,
                content_type,
                body,
                body_base64,
                cookies: (!set_cookies.is_empty()).then_some(set_cookies),
            }),
            advice,
            context: None,
            error_type: None,
            error_details: None,
        }
    }
}

fn build_client(policy: reqwest::redirect::Policy) -> Result<Client> {
    Client::builder()
        .redirect(policy)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| HttpExecError::Config(format!("failed to build HTTP client: {e}")))
}

fn failed_envelope(
    err: &HttpExecError,
    echo: RequestEcho,
    request_body_len: usize,
    mut advice: Vec<String>,
) -> ResponseEnvelope {
    let message = err.to_string();
    let kind = classify_failure(&message);
    warn!(error_type = %kind, error = %message, url = %echo.url, "http request failed");

    if echo.clear_session {
        advice.push(ADVICE_SESSION_CLEARED.to_string());
    }
    if kind == FailureKind::Timeout {
        advice.push(ADVICE_RETRY_TIMEOUT.to_string());
    } else {
        advice.push(ADVICE_VERIFY_REQUEST.to_string());
    }

    ResponseEnvelope {
        ok: false,
        code: None,
        status: "error".to_string(),
        message: message.clone(),
        timing_ms: None,
        size_bytes: as_u64(request_body_len),
        request: echo,
        response: ResponseDetails::Failed {
            error: message.clone(),
        },
        advice,
        context: None,
        error_type: Some(kind),
        error_details: Some(message),
    }
}

fn materialize_body(
    bytes: &[u8],
    response_type: ResponseType,
    advice: &mut Vec<String>,
) -> MaterializedBody {
    match response_type {
        ResponseType::Binary => MaterializedBody::Binary {
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            len: bytes.len(),
        },
        ResponseType::Json => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(parsed) => {
                    MaterializedBody::Text(serde_json::to_string_pretty(&parsed).unwrap_or(text))
                }
                Err(_) => {
                    advice.push(ADVICE_JSON_PARSE_FAILED.to_string());
                    MaterializedBody::Text(text)
                }
            }
        }
        ResponseType::Text => MaterializedBody::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Flatten response headers into a name -> value list; repeated headers are joined with `, `.
fn collect_headers(map: &HeaderMap) -> HeaderList {
    let mut out = HeaderList::new();
    for name in map.keys() {
        let joined = map
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        out.append(name.as_str(), joined);
    }
    out
}

/// Individual `Set-Cookie` values. `HeaderMap` keeps each occurrence as its own entry.
fn collect_set_cookies(map: &HeaderMap) -> Vec<String> {
    map.get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn rounded_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros().saturating_add(500) / 1000).unwrap_or(u64::MAX)
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
