//! Transport failure classification.
//!
//! Classification is a best-effort heuristic over the failure message text. The needles include
//! both the classic socket error codes (`ECONNREFUSED`, `ENOTFOUND`, ...) and the wording the Rust
//! HTTP stack produces (`Connection refused`, `dns error`, `invalid peer certificate`, ...). If the
//! underlying client changes its error wording, this module is the one place to update.

use serde::{Deserialize, Serialize};
use std::error::Error as _;

/// Stable failure tag reported as `error_type` in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    DnsError,
    ConnectError,
    SslError,
    NetworkError,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::DnsError => "dns_error",
            Self::ConnectError => "connect_error",
            Self::SslError => "ssl_error",
            Self::NetworkError => "network_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in order; the first tag with a matching needle wins.
const RULES: &[(FailureKind, &[&str])] = &[
    (FailureKind::Timeout, &["timed out", "abort"]),
    (FailureKind::DnsError, &["enotfound", "dns"]),
    (
        FailureKind::ConnectError,
        &[
            "econrefused",
            "econnrefused",
            "econnreset",
            "connection refused",
            "connection reset",
        ],
    ),
    (FailureKind::SslError, &["ssl", "tls", "certificate"]),
];

/// Map a failure message to exactly one [`FailureKind`] (case-insensitive substring match).
#[must_use]
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map_or(FailureKind::NetworkError, |(kind, _)| *kind)
}

/// One-line description of a reqwest error, including its source chain.
///
/// The request URL is stripped first: the envelope already echoes it, and host names must not
/// influence classification (think `tls.example.com`).
#[must_use]
pub fn describe_error(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !msg.contains(&text) {
            msg.push_str(": ");
            msg.push_str(&text);
        }
        source = cause.source();
    }
    msg
}
