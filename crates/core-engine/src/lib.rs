//! Request execution engine for curl-mcp.
//!
//! This crate is used by:
//! - `curl-mcp` (stdio and streamable HTTP front ends)
//!
//! It intentionally knows **nothing** about transports, sessions, or authentication. The single
//! entry point is [`HttpExecutor::execute`], which performs one HTTP exchange and always returns a
//! well-formed [`ResponseEnvelope`].

pub mod cookies;
pub mod executor;
pub mod failure;
pub mod headers;
pub mod model;

pub use cookies::CookieJar;
pub use executor::{DEFAULT_USER_AGENT, HttpExecError, HttpExecutor};
pub use failure::{FailureKind, classify_failure};
pub use headers::HeaderList;
pub use model::{
    CallContext, HttpMethod, ReceivedResponse, RequestDescription, RequestEcho, ResponseDetails,
    ResponseEnvelope, ResponseType,
};
