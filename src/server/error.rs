//! Supervisor error types.

use super::SpawnError;

/// Errors returned when starting a server.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// No definition with this name.
    #[error("Server '{0}' not found in configuration")]
    NotFound(String),

    /// The definition is disabled.
    #[error("Server '{0}' is disabled in configuration")]
    Disabled(String),

    /// No readiness marker within the ready timeout. The process keeps running.
    #[error("Server '{name}' did not start within {timeout_ms}ms")]
    StartTimeout { name: String, timeout_ms: u64 },

    /// The process could not be spawned.
    #[error("Failed to spawn server '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: SpawnError,
    },

    /// A stdio pipe was not available after spawn.
    #[error("Server '{name}' {stream} not available")]
    MissingPipe { name: String, stream: &'static str },
}
