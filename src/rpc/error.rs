//! Request error types.

/// Errors that can occur while issuing a request to a server.
#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    /// The server is not running or has not signaled readiness.
    #[error("Server '{server}' is not ready")]
    NotReady { server: String },

    /// No matching response arrived in time.
    #[error("Request '{method}' to '{server}' timed out after {timeout_ms}ms")]
    RequestTimeout {
        server: String,
        method: String,
        timeout_ms: u64,
    },

    /// The server answered with an error payload.
    #[error("{message}")]
    Remote {
        server: String,
        method: String,
        code: Option<i64>,
        message: String,
    },

    /// The server's output closed while the request was pending.
    #[error("Server '{server}' exited before responding")]
    ServerExited { server: String },

    /// Failed to serialize the request.
    #[error("Failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to write the request to the server.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
