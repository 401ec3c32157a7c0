//! Request guards for the `/mcp` endpoint.
//!
//! Checks run in a fixed order: executor shared secret, API key, then host/origin allowlists.
//! Rejections carry a JSON-RPC error body with a null id.

use crate::config::HttpTransportConfig;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::sync::Arc;

pub const JSONRPC_SERVER_ERROR: i64 = -32000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: &'static str,
}

impl Rejection {
    const fn unauthorized(message: &'static str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message,
        }
    }

    const fn forbidden(message: &'static str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = json!({
            "jsonrpc": "2.0",
            "error": { "code": JSONRPC_SERVER_ERROR, "message": self.message },
            "id": null,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Reject requests that do not carry the configured executor secret.
///
/// # Errors
///
/// Returns a 401 rejection when a secret is configured and the header is missing or different.
pub fn check_executor_secret(
    config: &HttpTransportConfig,
    headers: &HeaderMap,
) -> Result<(), Rejection> {
    let Some(expected) = config.executor_secret.as_deref() else {
        return Ok(());
    };
    match header_str(headers, &config.executor_secret_header) {
        Some(provided) if provided == expected => Ok(()),
        _ => Err(Rejection::unauthorized("Unauthorized.")),
    }
}

/// Candidate API key: bearer token, then the raw `Authorization` value, then `x-api-key`.
fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(authz) = header_str(headers, header::AUTHORIZATION.as_str()).filter(|v| !v.is_empty())
    {
        if let Some(token) = authz.strip_prefix("Bearer ").filter(|t| !t.is_empty()) {
            return Some(token);
        }
        return Some(authz);
    }
    header_str(headers, "x-api-key").filter(|v| !v.is_empty())
}

/// Enforce the API key requirement.
///
/// # Errors
///
/// Returns a 401 rejection when keys are required and either none are configured or the
/// presented key is not one of them.
pub fn check_api_key(config: &HttpTransportConfig, headers: &HeaderMap) -> Result<(), Rejection> {
    if !config.require_key {
        return Ok(());
    }
    if config.api_keys.is_empty() {
        return Err(Rejection::unauthorized(
            "API key required but none configured.",
        ));
    }
    match extract_api_key(headers) {
        Some(key) if config.api_keys.iter().any(|k| k == key) => Ok(()),
        _ => Err(Rejection::unauthorized("Unauthorized: invalid API key.")),
    }
}

/// Enforce the `Host` and `Origin` allowlists. An empty list allows everything; a non-empty
/// list also rejects requests that omit the header.
///
/// # Errors
///
/// Returns a 403 rejection for a host or origin outside a non-empty allowlist.
pub fn check_host_origin(
    config: &HttpTransportConfig,
    headers: &HeaderMap,
) -> Result<(), Rejection> {
    if !config.allowed_hosts.is_empty() {
        let host = header_str(headers, header::HOST.as_str()).unwrap_or_default();
        if !config.allowed_hosts.iter().any(|h| h == host) {
            return Err(Rejection::forbidden("Forbidden: host not allowed."));
        }
    }

    if !config.allowed_origins.is_empty() {
        let origin = header_str(headers, header::ORIGIN.as_str()).unwrap_or_default();
        if !config.allowed_origins.iter().any(|o| o == origin) {
            return Err(Rejection::forbidden("Forbidden: origin not allowed."));
        }
    }

    Ok(())
}

/// Run every guard in order and return the first rejection.
///
/// # Errors
///
/// Returns the first failing guard's rejection.
pub fn check_all(config: &HttpTransportConfig, headers: &HeaderMap) -> Result<(), Rejection> {
    check_executor_secret(config, headers)?;
    check_api_key(config, headers)?;
    check_host_origin(config, headers)
}

/// axum middleware applying [`check_all`].
pub async fn guard_mcp(
    State(config): State<Arc<HttpTransportConfig>>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(rejection) = check_all(&config, req.headers()) {
        tracing::warn!(
            status = rejection.status.as_u16(),
            reason = rejection.message,
            method = %req.method(),
            path = req.uri().path(),
            "rejected /mcp request"
        );
        return rejection.into_response();
    }
    next.run(req).await
}
