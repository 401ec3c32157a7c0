//! Request description, call context, and the response envelope.
//!
//! Field names on the wire are snake_case (`timeout_seconds`, `body_base64`, ...).

use crate::failure::FailureKind;
use crate::headers::HeaderList;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(format!(
                "unsupported HTTP method '{other}' (expected one of GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS)"
            )),
        }
    }
}

// Methods are accepted in any case and normalized to upper case.
impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
            HttpMethod::Head => Self::HEAD,
            HttpMethod::Options => Self::OPTIONS,
        }
    }
}

/// How the response body is materialized into the envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Text,
    Json,
    Binary,
}

/// Declarative description of one HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescription {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeaderList>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_session: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_session: Option<bool>,
}

impl RequestDescription {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: None,
            body: None,
            timeout_seconds: None,
            response_type: None,
            persist_session: None,
            follow_redirects: None,
            clear_session: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HeaderList::new)
            .insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, secs: i64) -> Self {
        self.timeout_seconds = Some(secs);
        self
    }

    #[must_use]
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    #[must_use]
    pub fn with_persist_session(mut self, on: bool) -> Self {
        self.persist_session = Some(on);
        self
    }

    #[must_use]
    pub fn with_follow_redirects(mut self, on: bool) -> Self {
        self.follow_redirects = Some(on);
        self
    }

    #[must_use]
    pub fn with_clear_session(mut self, on: bool) -> Self {
        self.clear_session = Some(on);
        self
    }

    /// Effective timeout: default 30s, clamped to `[1, 120]` seconds.
    #[must_use]
    pub fn effective_timeout_seconds(&self) -> u64 {
        clamp_timeout_seconds(self.timeout_seconds)
    }

    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.effective_timeout_seconds())
    }

    #[must_use]
    pub fn effective_response_type(&self) -> ResponseType {
        self.response_type.unwrap_or_default()
    }

    #[must_use]
    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects.unwrap_or(true)
    }

    /// Lower-cased host parsed from `url`, or `None` if the URL does not parse or has no host.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    }
}

#[must_use]
pub fn clamp_timeout_seconds(requested: Option<i64>) -> u64 {
    let secs = requested.unwrap_or(DEFAULT_TIMEOUT_SECONDS as i64);
    // Both bounds are small positive constants, so the clamped value always fits in u64.
    secs.clamp(MIN_TIMEOUT_SECONDS as i64, MAX_TIMEOUT_SECONDS as i64)
        .unsigned_abs()
}

/// Caller-supplied metadata, copied verbatim into the envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Normalized echo of the request, as executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEcho {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeaderList>,
    pub body: Option<String>,
    pub timeout_seconds: u64,
    pub response_type: ResponseType,
    pub persist_session: bool,
    pub follow_redirects: bool,
    pub clear_session: bool,
}

impl From<&RequestDescription> for RequestEcho {
    fn from(req: &RequestDescription) -> Self {
        Self {
            url: req.url.clone(),
            method: req.method,
            headers: req.headers.clone(),
            body: req.body.clone(),
            timeout_seconds: req.effective_timeout_seconds(),
            response_type: req.effective_response_type(),
            persist_session: req.persist_session.unwrap_or(false),
            follow_redirects: req.follows_redirects(),
            clear_session: req.clear_session.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HeaderList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
    /// Raw `Set-Cookie` values, omitted when none were returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseDetails {
    Received(ReceivedResponse),
    Failed { error: String },
}

/// Structured result of one execution. Always produced, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub ok: bool,
    pub code: Option<u16>,
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_ms: Option<u64>,
    pub size_bytes: u64,
    pub request: RequestEcho,
    pub response: ResponseDetails,
    pub advice: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CallContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl ResponseEnvelope {
    /// The received response, if the exchange completed.
    #[must_use]
    pub fn received(&self) -> Option<&ReceivedResponse> {
        match &self.response {
            ResponseDetails::Received(r) => Some(r),
            ResponseDetails::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn has_advice(&self, needle: &str) -> bool {
        self.advice.iter().any(|a| a.contains(needle))
    }
}
