//! Command-line and environment configuration.
//!
//! Every flag can also be set through an environment variable so the server can be configured
//! the same way under an MCP host (which usually passes env only) and under a container runtime.

use crate::error::{Result, ServerError};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_EXECUTOR_SECRET_HEADER: &str = "x-calibress-executor-secret";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "curl-mcp",
    about = "MCP server exposing a curl-like HTTP request tool",
    disable_version_flag = true
)]
pub struct Cli {
    /// Print the version and exit.
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Serve MCP over streamable HTTP instead of stdio.
    #[arg(long)]
    pub http: bool,

    /// HTTP listen port. Falls back to `PORT`, then 3000.
    #[arg(long, env = "MCP_PORT")]
    pub port: Option<u16>,

    /// HTTP listen address.
    #[arg(long, env = "MCP_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Require an API key on `/mcp` (only the literal `true` enables it).
    #[arg(
        long,
        env = "MCP_REQUIRE_KEY",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_enabled
    )]
    pub require_key: bool,

    /// Comma-separated list of accepted API keys.
    #[arg(long, env = "MCP_API_KEYS", hide_env_values = true)]
    pub api_keys: Option<String>,

    /// Comma-separated allowlist for the `Host` header.
    #[arg(long, env = "MCP_ALLOWED_HOSTS")]
    pub allowed_hosts: Option<String>,

    /// Comma-separated allowlist for the `Origin` header (also drives CORS).
    #[arg(long, env = "MCP_ALLOWED_ORIGINS")]
    pub allowed_origins: Option<String>,

    /// Shared secret every `/mcp` request must present.
    #[arg(long, env = "CURL_MCP_EXECUTOR_SHARED_SECRET", hide_env_values = true)]
    pub executor_secret: Option<String>,

    /// Header carrying the executor shared secret.
    #[arg(
        long,
        env = "CURL_MCP_EXECUTOR_SECRET_HEADER",
        default_value = DEFAULT_EXECUTOR_SECRET_HEADER
    )]
    pub executor_secret_header: String,

    /// Log filter directive (e.g. `info`, `curl_mcp=debug`).
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "CURL_MCP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Settings for the streamable HTTP transport, resolved from [`Cli`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    pub bind: SocketAddr,
    pub require_key: bool,
    pub api_keys: Vec<String>,
    pub allowed_hosts: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub executor_secret: Option<String>,
    /// Lowercase header name.
    pub executor_secret_header: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            require_key: false,
            api_keys: Vec::new(),
            allowed_hosts: Vec::new(),
            allowed_origins: Vec::new(),
            executor_secret: None,
            executor_secret_header: DEFAULT_EXECUTOR_SECRET_HEADER.to_string(),
        }
    }
}

impl Cli {
    /// Resolve the HTTP transport settings, reading `PORT` as the port fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if `PORT` is set but not a valid port, or if the secret
    /// header name is empty.
    pub fn http_config(&self) -> Result<HttpTransportConfig> {
        self.http_config_with_port_fallback(std::env::var("PORT").ok().as_deref())
    }

    /// Same as [`Cli::http_config`] with an explicit `PORT` fallback value.
    ///
    /// # Errors
    ///
    /// See [`Cli::http_config`].
    pub fn http_config_with_port_fallback(
        &self,
        port_fallback: Option<&str>,
    ) -> Result<HttpTransportConfig> {
        let port = resolve_port(self.port, port_fallback)?;

        let executor_secret_header = self.executor_secret_header.trim().to_ascii_lowercase();
        if executor_secret_header.is_empty() {
            return Err(ServerError::Config(
                "executor secret header name must not be empty".to_string(),
            ));
        }

        Ok(HttpTransportConfig {
            bind: SocketAddr::new(self.bind, port),
            require_key: self.require_key,
            api_keys: split_csv(self.api_keys.as_deref()),
            allowed_hosts: split_csv(self.allowed_hosts.as_deref()),
            allowed_origins: split_csv(self.allowed_origins.as_deref()),
            executor_secret: self.executor_secret.clone().filter(|s| !s.is_empty()),
            executor_secret_header,
        })
    }
}

fn resolve_port(explicit: Option<u16>, fallback: Option<&str>) -> Result<u16> {
    if let Some(port) = explicit {
        return Ok(port);
    }
    match fallback.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| ServerError::Config(format!("invalid PORT value '{raw}'"))),
        None => Ok(DEFAULT_PORT),
    }
}

fn parse_enabled(raw: &str) -> std::result::Result<bool, String> {
    Ok(raw.trim().eq_ignore_ascii_case("true"))
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
#[must_use]
pub fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
