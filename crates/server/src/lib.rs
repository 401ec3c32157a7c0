//! curl-mcp: an MCP server exposing a single `curl_request` tool.
//!
//! The request engine lives in `curl-mcp-core`; this crate wires it to the MCP tool surface and
//! to the two transports (stdio and streamable HTTP).

pub mod config;
pub mod error;
pub mod guards;
pub mod http;
pub mod session_manager;
pub mod stdio;
pub mod tools;

pub use error::{Result, ServerError};
