//! Session manager wrapper for rmcp's streamable HTTP transport.
//!
//! Behavior is delegated to rmcp's `LocalSessionManager`; the wrapper tracks which sessions are
//! open so shutdown can close every one of them, and logs session lifecycle.

use futures::Stream;
use parking_lot::Mutex;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::transport::common::server_side_http::ServerSseMessage;
use rmcp::transport::streamable_http_server::session::SessionId;
use rmcp::transport::streamable_http_server::session::SessionManager;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use std::collections::HashSet;
use std::future::Future;

#[derive(Default)]
pub struct CurlSessionManager {
    inner: LocalSessionManager,
    open: Mutex<HashSet<SessionId>>,
}

impl CurlSessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions created and not yet closed.
    #[must_use]
    pub fn open_session_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Close every open session. Used on shutdown.
    ///
    /// Sessions the inner manager already retired are only dropped from the tracking set.
    pub async fn close_all(&self) {
        let ids: Vec<SessionId> = self.open.lock().iter().cloned().collect();
        for id in ids {
            match self.inner.has_session(&id).await {
                Ok(true) => {
                    if let Err(e) = self.close_session_impl(&id).await {
                        tracing::warn!(session_id = %id, error = %e, "failed to close session");
                    }
                }
                _ => self.forget(&id),
            }
        }
    }

    fn forget(&self, id: &SessionId) {
        if self.open.lock().remove(id) {
            tracing::debug!(session_id = %id, "session expired");
        }
    }

    async fn has_session_impl(
        &self,
        id: &SessionId,
    ) -> Result<bool, <LocalSessionManager as SessionManager>::Error> {
        let alive = self.inner.has_session(id).await?;
        if !alive {
            self.forget(id);
        }
        Ok(alive)
    }

    async fn create_session_impl(
        &self,
    ) -> Result<
        (SessionId, <LocalSessionManager as SessionManager>::Transport),
        <LocalSessionManager as SessionManager>::Error,
    > {
        let (id, transport) = self.inner.create_session().await?;
        self.open.lock().insert(id.clone());
        tracing::info!(session_id = %id, "session initialized");
        Ok((id, transport))
    }

    async fn close_session_impl(
        &self,
        id: &SessionId,
    ) -> Result<(), <LocalSessionManager as SessionManager>::Error> {
        let result = self.inner.close_session(id).await;
        if self.open.lock().remove(id) {
            tracing::info!(session_id = %id, "session closed");
        }
        result
    }
}

impl SessionManager for CurlSessionManager {
    type Error = <LocalSessionManager as SessionManager>::Error;
    type Transport = <LocalSessionManager as SessionManager>::Transport;

    fn create_session(
        &self,
    ) -> impl Future<Output = Result<(SessionId, Self::Transport), Self::Error>> + Send {
        self.create_session_impl()
    }

    fn initialize_session(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<Output = Result<ServerJsonRpcMessage, Self::Error>> + Send {
        self.inner.initialize_session(id, message)
    }

    fn has_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        self.has_session_impl(id)
    }

    fn close_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.close_session_impl(id)
    }

    fn create_stream(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.create_stream(id, message)
    }

    fn accept_message(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.inner.accept_message(id, message)
    }

    fn create_standalone_stream(
        &self,
        id: &SessionId,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.create_standalone_stream(id)
    }

    fn resume(
        &self,
        id: &SessionId,
        last_event_id: String,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.resume(id, last_event_id)
    }
}
