//! Configuration types.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Ready timeout used when a definition omits one (or sets it to zero).
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 30_000;

/// Per-request timeout used when the configuration omits one.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Definition of a server that can be launched and addressed over stdio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Server name. Filled from the configuration key.
    #[serde(skip)]
    pub name: String,
    /// Program to launch.
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides merged over the current environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Whether the server may be started.
    #[serde(default)]
    pub enabled: bool,
    /// Ready timeout in milliseconds.
    #[serde(default = "default_ready_timeout")]
    pub timeout: u64,
    /// Free-text description shown by `list`.
    #[serde(default)]
    pub description: String,
    /// Extra readiness markers on top of the built-in set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ready_markers: Vec<String>,
}

fn default_ready_timeout() -> u64 {
    DEFAULT_READY_TIMEOUT_MS
}

impl ServerDefinition {
    /// Create an enabled definition with default timeout and no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            enabled: true,
            timeout: DEFAULT_READY_TIMEOUT_MS,
            description: String::new(),
            ready_markers: Vec::new(),
        }
    }

    /// Set the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the enabled flag.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the ready timeout in milliseconds.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a readiness marker.
    #[must_use]
    pub fn with_ready_marker(mut self, marker: impl Into<String>) -> Self {
        self.ready_markers.push(marker.into());
        self
    }

    /// Effective ready timeout. Zero falls back to the default.
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        if self.timeout == 0 {
            Duration::from_millis(DEFAULT_READY_TIMEOUT_MS)
        } else {
            Duration::from_millis(self.timeout)
        }
    }
}

/// Policy for the update processor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingPolicy {
    /// Server the update processor talks to.
    #[serde(default)]
    pub preferred_server: Option<String>,
    /// Return manual instructions instead of failing when processing breaks.
    #[serde(default)]
    pub fallback_to_manual: bool,
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocFlowConfig {
    /// Server definitions keyed by name.
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, ServerDefinition>,
    /// Update processor policy.
    #[serde(default)]
    pub mcp_processing: ProcessingPolicy,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for DocFlowConfig {
    fn default() -> Self {
        Self {
            mcp_servers: BTreeMap::new(),
            mcp_processing: ProcessingPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl DocFlowConfig {
    /// Add a server definition keyed by its name.
    #[must_use]
    pub fn with_server(mut self, definition: ServerDefinition) -> Self {
        self.mcp_servers
            .insert(definition.name.clone(), definition);
        self
    }

    /// Copy each map key into its definition's `name`.
    pub fn assign_names(&mut self) {
        for (name, definition) in &mut self.mcp_servers {
            definition.name.clone_from(name);
        }
    }

    /// Look up a server definition.
    #[must_use]
    pub fn server(&self, name: &str) -> Option<&ServerDefinition> {
        self.mcp_servers.get(name)
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        if self.request_timeout == 0 {
            Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
        } else {
            Duration::from_millis(self.request_timeout)
        }
    }
}
