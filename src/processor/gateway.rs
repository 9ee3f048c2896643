//! The seam between the update workflow and the servers it talks to.

use async_trait::async_trait;
use serde_json::Value;

use crate::rpc::RpcError;
use crate::server::{ServerSupervisor, SupervisorError};

/// Something that can start a named server and forward requests to it.
#[async_trait]
pub trait ServerGateway: Send + Sync {
    /// Make sure the server is running and ready.
    async fn ensure_started(&self, server: &str) -> Result<(), SupervisorError>;

    /// Send one request and wait for its result.
    async fn request(&self, server: &str, method: &str, params: Value) -> Result<Value, RpcError>;
}

#[async_trait]
impl ServerGateway for ServerSupervisor {
    async fn ensure_started(&self, server: &str) -> Result<(), SupervisorError> {
        self.start(server).await.map(|_| ())
    }

    async fn request(&self, server: &str, method: &str, params: Value) -> Result<Value, RpcError> {
        self.send_request(server, method, params).await
    }
}
