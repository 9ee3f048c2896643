//! Supervisor for configured server processes.
//!
//! The supervisor owns the server definitions and the registry of running
//! instances. Each started server gets three background tasks: a stdout
//! reader (readiness + response routing), a stderr reader (readiness +
//! diagnostics) and an exit watcher that unregisters the instance when the
//! process goes away.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::{DocFlowConfig, ServerDefinition, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::rpc::{Correlator, RpcError};
use crate::server::running::pump_output;
use crate::server::{
    OutputStream, RunningServer, ServerCommand, ServerProcess, ServerRegistry, ServerState,
    SupervisorError, DEFAULT_TERMINATE_TIMEOUT,
};

/// Snapshot of one configured server for `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub running: bool,
    pub state: Option<ServerState>,
}

/// Starts, stops and addresses configured servers.
#[derive(Debug)]
pub struct ServerSupervisor {
    definitions: BTreeMap<String, Arc<ServerDefinition>>,
    registry: ServerRegistry,
    next_instance: AtomicU64,
    request_timeout: Duration,
}

impl ServerSupervisor {
    /// Create a supervisor for the servers in `config`.
    #[must_use]
    pub fn new(config: &DocFlowConfig) -> Self {
        let definitions = config
            .mcp_servers
            .iter()
            .map(|(name, definition)| {
                let mut definition = definition.clone();
                definition.name.clone_from(name);
                (name.clone(), Arc::new(definition))
            })
            .collect();

        Self {
            definitions,
            registry: ServerRegistry::new(),
            next_instance: AtomicU64::new(1),
            request_timeout: config.request_timeout(),
        }
    }

    /// Create a supervisor from bare definitions.
    #[must_use]
    pub fn from_definitions<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = ServerDefinition>,
    {
        let config = definitions
            .into_iter()
            .fold(DocFlowConfig::default(), DocFlowConfig::with_server);
        Self::new(&config)
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Definition for `name`.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&ServerDefinition> {
        self.definitions.get(name).map(AsRef::as_ref)
    }

    /// The running-server registry.
    #[must_use]
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Running instance for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<RunningServer>> {
        self.registry.get(name)
    }

    /// Whether `name` has a running instance.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Whether `name` is running and ready.
    #[must_use]
    pub fn is_ready(&self, name: &str) -> bool {
        self.registry.get(name).is_some_and(|s| s.is_ready())
    }

    /// Names of running servers.
    #[must_use]
    pub fn running(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Start `name` and wait until it is ready.
    ///
    /// Returns the existing instance unchanged if one is registered.
    ///
    /// # Errors
    ///
    /// - [`SupervisorError::NotFound`] / [`SupervisorError::Disabled`] before anything is spawned
    /// - [`SupervisorError::Spawn`] if the process cannot be launched
    /// - [`SupervisorError::StartTimeout`] if no readiness marker shows up in
    ///   time; the process is left running and registered
    pub async fn start(&self, name: &str) -> Result<Arc<RunningServer>, SupervisorError> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;

        if !definition.enabled {
            return Err(SupervisorError::Disabled(name.to_string()));
        }

        let (server, spawned) = self.spawn_registered(definition)?;
        if !spawned {
            tracing::info!(server = %name, "Server already running");
            return Ok(server);
        }

        self.wait_until_ready(&server).await?;
        Ok(server)
    }

    /// Spawn and register a process unless one is already registered.
    ///
    /// Check and insert happen under one registry lock.
    fn spawn_registered(
        &self,
        definition: &Arc<ServerDefinition>,
    ) -> Result<(Arc<RunningServer>, bool), SupervisorError> {
        let name = definition.name.as_str();
        let mut servers = self.registry.lock();
        if let Some(existing) = servers.get(name) {
            return Ok((Arc::clone(existing), false));
        }

        tracing::info!(
            server = %name,
            description = %definition.description,
            command = %definition.command,
            "Starting server"
        );

        let mut process = ServerProcess::spawn(&ServerCommand::from_definition(definition))
            .map_err(|source| SupervisorError::Spawn {
                name: name.to_string(),
                source,
            })?;

        let missing = |stream| SupervisorError::MissingPipe {
            name: name.to_string(),
            stream,
        };
        let stdin = process.take_stdin().ok_or_else(|| missing("stdin"))?;
        let stdout = process.take_stdout().ok_or_else(|| missing("stdout"))?;
        let stderr = process.take_stderr().ok_or_else(|| missing("stderr"))?;

        let (terminate_tx, terminate_rx) = oneshot::channel();
        let server = Arc::new(RunningServer::new(
            self.next_instance.fetch_add(1, Ordering::Relaxed),
            Arc::clone(definition),
            process.id(),
            Correlator::new(name, stdin),
            terminate_tx,
        ));
        servers.insert(name.to_string(), Arc::clone(&server));
        drop(servers);

        tracing::debug!(server = %name, pid = ?server.pid(), instance = server.instance(), "Server spawned");

        tokio::spawn(pump_output(
            Arc::clone(&server),
            OutputStream::Stdout,
            stdout,
        ));
        tokio::spawn(pump_output(
            Arc::clone(&server),
            OutputStream::Stderr,
            stderr,
        ));
        tokio::spawn(watch_exit(
            process,
            terminate_rx,
            Arc::clone(&server),
            self.registry.clone(),
        ));

        Ok((server, true))
    }

    async fn wait_until_ready(&self, server: &RunningServer) -> Result<(), SupervisorError> {
        let timeout = server.definition().ready_timeout();
        // The marker flag never resets, so a child that signals and exits
        // before this point still counts as started.
        let mut seen = server.subscribe_marker();

        let ready = tokio::time::timeout(timeout, async {
            seen.wait_for(|seen| *seen).await.is_ok()
        })
        .await
        .unwrap_or(false);

        if ready {
            return Ok(());
        }

        server.transition(ServerState::TimedOut);
        tracing::warn!(server = %server.name(), "Server did not signal readiness, leaving it running");
        Err(SupervisorError::StartTimeout {
            name: server.name().to_string(),
            timeout_ms: duration_ms(timeout),
        })
    }

    /// Stop `name`. Unknown names are a silent no-op.
    ///
    /// The instance is unregistered immediately; process exit happens in the
    /// background. Returns whether anything was stopped.
    pub fn stop(&self, name: &str) -> bool {
        let Some(server) = self.registry.remove(name) else {
            return false;
        };
        tracing::info!(server = %name, pid = ?server.pid(), "Stopping server");
        server.request_terminate();
        true
    }

    /// Stop every registered server, in registry order.
    pub fn stop_all(&self) -> Vec<String> {
        let names = self.registry.names();
        tracing::info!(count = names.len(), "Stopping all servers");
        names.into_iter().filter(|name| self.stop(name)).collect()
    }

    /// Stop everything and wait for the processes to be reaped.
    pub async fn shutdown(&self) {
        let servers: Vec<Arc<RunningServer>> = self
            .registry
            .names()
            .iter()
            .filter_map(|name| self.registry.get(name))
            .collect();
        self.stop_all();
        for server in servers {
            server.wait_exited().await;
        }
    }

    /// Wait until the instance registered under `name` exits.
    ///
    /// Returns immediately if nothing is registered.
    pub async fn wait_for_exit(&self, name: &str) {
        if let Some(server) = self.registry.get(name) {
            server.wait_exited().await;
        }
    }

    /// Status of every configured server, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<ServerStatus> {
        self.definitions
            .values()
            .map(|definition| {
                let running = self.registry.get(&definition.name);
                ServerStatus {
                    name: definition.name.clone(),
                    description: definition.description.clone(),
                    enabled: definition.enabled,
                    running: running.is_some(),
                    state: running.map(|s| s.state()),
                }
            })
            .collect()
    }

    /// Send a request to a ready server.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::NotReady`] if the server is not registered or not
    /// ready, otherwise the correlator's error.
    pub async fn send_request(
        &self,
        name: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, RpcError> {
        let server = self.registry.get(name).ok_or_else(|| RpcError::NotReady {
            server: name.to_string(),
        })?;
        tracing::info!(server = %name, %method, "Sending request");
        server.call(method, params, self.request_timeout).await
    }
}

impl Default for ServerSupervisor {
    fn default() -> Self {
        Self {
            definitions: BTreeMap::new(),
            registry: ServerRegistry::new(),
            next_instance: AtomicU64::new(1),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

/// Wait for the process to exit (or be told to terminate), then unregister.
async fn watch_exit(
    mut process: ServerProcess,
    terminate_rx: oneshot::Receiver<()>,
    server: Arc<RunningServer>,
    registry: ServerRegistry,
) {
    let exited = tokio::select! {
        status = process.wait() => Some(status),
        Ok(()) = terminate_rx => None,
    };

    let status = match exited {
        Some(status) => status,
        None => process.terminate(DEFAULT_TERMINATE_TIMEOUT).await,
    };

    match status {
        Ok(status) => {
            tracing::info!(server = %server.name(), code = ?status.code(), "Server exited");
        }
        Err(e) => {
            tracing::warn!(server = %server.name(), error = %e, "Failed to reap server process");
        }
    }

    registry.remove_instance(server.name(), server.instance());
    server.mark_exited();
}

// Safe: timeout values are never going to exceed u64::MAX milliseconds
#[allow(clippy::cast_possible_truncation)]
fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
