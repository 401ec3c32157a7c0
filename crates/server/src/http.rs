//! Streamable HTTP transport.
//!
//! `/mcp` is served by rmcp's `StreamableHttpService` behind the request guards; `/health` is
//! unauthenticated. A small CORS layer wraps everything and answers preflight requests before
//! the guards run.

use crate::config::HttpTransportConfig;
use crate::error::{Result, ServerError};
use crate::guards::guard_mcp;
use crate::session_manager::CurlSessionManager;
use crate::tools::{CurlMcpServer, Transport};
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use curl_mcp_core::HttpExecutor;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CORS_ALLOW_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";
const CORS_EXPOSE_HEADERS: &str = "mcp-session-id";

/// Build the HTTP application.
pub fn router(
    config: Arc<HttpTransportConfig>,
    executor: HttpExecutor,
    sessions: Arc<CurlSessionManager>,
) -> Router {
    let mcp = StreamableHttpService::new(
        move || Ok(CurlMcpServer::new(executor.clone(), Transport::Http)),
        sessions,
        StreamableHttpServerConfig::default(),
    );

    let guarded = Router::new()
        .nest_service("/mcp", mcp)
        .layer(middleware::from_fn_with_state(config.clone(), guard_mcp));

    Router::new()
        .route("/health", get(health))
        .merge(guarded)
        .layer(middleware::from_fn_with_state(config, cors))
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok", "version": crate::tools::VERSION }))
}

/// `Access-Control-Allow-Origin` value for a request, if any.
///
/// With no configured origins every origin is allowed (`*`); otherwise the request origin is
/// reflected only when listed.
fn cors_allow_origin(config: &HttpTransportConfig, origin: Option<&str>) -> Option<String> {
    if config.allowed_origins.is_empty() {
        return Some("*".to_string());
    }
    origin
        .filter(|o| config.allowed_origins.iter().any(|a| a == o))
        .map(str::to_string)
}

fn apply_cors_headers(headers: &mut HeaderMap, allow_origin: Option<&str>, restricted: bool) {
    if let Some(value) = allow_origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    if restricted {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(CORS_EXPOSE_HEADERS),
    );
}

async fn cors(
    State(config): State<Arc<HttpTransportConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let allow_origin = cors_allow_origin(&config, origin.as_deref());
    let restricted = !config.allowed_origins.is_empty();

    if req.method() == Method::OPTIONS {
        let requested_headers = req
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned();
        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        apply_cors_headers(headers, allow_origin.as_deref(), restricted);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        );
        if let Some(requested) = requested_headers {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested);
            headers.append(
                header::VARY,
                HeaderValue::from_static("Access-Control-Request-Headers"),
            );
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        return resp;
    }

    let mut resp = next.run(req).await;
    apply_cors_headers(resp.headers_mut(), allow_origin.as_deref(), restricted);
    resp
}

/// Bind `config.bind` and serve until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve_http(
    config: HttpTransportConfig,
    executor: HttpExecutor,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| ServerError::Startup(format!("bind {}: {e}", config.bind)))?;
    serve_listener(
        listener,
        Arc::new(config),
        executor,
        Arc::new(CurlSessionManager::new()),
        shutdown,
    )
    .await
}

/// Serve on an already-bound listener. When `shutdown` is cancelled every open session is
/// closed, then connections drain.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    config: Arc<HttpTransportConfig>,
    executor: HttpExecutor,
    sessions: Arc<CurlSessionManager>,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(config.clone(), executor, sessions.clone());

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        require_key = config.require_key,
        allowed_hosts = config.allowed_hosts.len(),
        allowed_origins = config.allowed_origins.len(),
        executor_secret = config.executor_secret.is_some(),
        "curl-mcp HTTP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!(
                open_sessions = sessions.open_session_count(),
                "Shutting down curl-mcp HTTP server"
            );
            sessions.close_all().await;
        })
        .await?;

    tracing::info!("curl-mcp HTTP server stopped");
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM.
pub async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
    token.cancel();
}
