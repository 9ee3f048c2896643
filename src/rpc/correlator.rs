//! Request correlation over a line-delimited stream.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::pending::PendingGuard;
use super::{ParsedResponse, PendingRequests, RpcError, RpcRequest};

/// Writer half of a server's input stream.
pub type RequestWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// What a single output line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDispatch {
    /// A response that completed a pending request.
    Matched,
    /// A response whose id nobody is waiting for.
    Unmatched,
    /// Not a protocol message.
    NotProtocol,
}

/// Sends requests to one server and matches responses back by id.
pub struct Correlator {
    server: String,
    writer: Mutex<RequestWriter>,
    pending: PendingRequests,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("server", &self.server)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Correlator {
    /// Create a correlator writing requests to `writer`.
    pub fn new(server: impl Into<String>, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            server: server.into(),
            writer: Mutex::new(Box::new(writer)),
            pending: PendingRequests::new(),
        }
    }

    /// Name of the server this correlator talks to.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// The pending request table.
    #[must_use]
    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// Send a request and wait for the response carrying its id.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Serialization`] / [`RpcError::Io`] if the request cannot be written
    /// - [`RpcError::RequestTimeout`] if no matching response arrives in time
    /// - [`RpcError::Remote`] if the response carries an error
    /// - [`RpcError::ServerExited`] if the output stream closes first
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        let id = self.pending.next_id();
        let line = RpcRequest::new(id, method, params).to_line()?;

        let rx = self.pending.register(id, method);
        let _guard = PendingGuard::new(&self.pending, id);

        tracing::debug!(server = %self.server, id, %method, "Sending request");
        self.write_line(&line).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response.into_result().map_err(|error| RpcError::Remote {
                server: self.server.clone(),
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
            Ok(Err(_)) => Err(RpcError::ServerExited {
                server: self.server.clone(),
            }),
            Err(_) => {
                tracing::warn!(server = %self.server, id, %method, "Request timed out");
                Err(RpcError::RequestTimeout {
                    server: self.server.clone(),
                    method: method.to_string(),
                    timeout_ms: duration_ms(timeout),
                })
            }
        }
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    }

    /// Route one line of server output.
    pub fn dispatch_line(&self, line: &str) -> LineDispatch {
        match ParsedResponse::parse(line) {
            Some(response) => {
                if self.pending.complete(response) {
                    LineDispatch::Matched
                } else {
                    LineDispatch::Unmatched
                }
            }
            None => LineDispatch::NotProtocol,
        }
    }

    /// Fail all waiting requests; called when the output stream ends.
    pub fn close(&self) {
        let drained = self.pending.close();
        if drained > 0 {
            tracing::warn!(
                server = %self.server,
                drained,
                "Output closed with requests still pending"
            );
        }
    }
}

// Safe: timeout values are never going to exceed u64::MAX milliseconds
#[allow(clippy::cast_possible_truncation)]
fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
