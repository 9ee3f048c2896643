//! The architecture update workflow.
//!
//! Steps run one after another against the preferred server. A failing step
//! is recorded and the workflow moves on; only reading the document or
//! starting the server can abort it, and those failures turn into manual
//! instructions when the policy allows.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ProcessingPolicy;
use crate::processor::{
    extract_components, generate_component_note, CommitInfo, ManualInstructions, ServerGateway,
};
use crate::server::SupervisorError;

/// Default location of the pending-updates document.
pub const DEFAULT_PENDING_FILE: &str = ".tools/doc-flow/pending-updates.md";

/// Tools assumed when the server cannot list its own.
pub const FALLBACK_TOOLS: [&str; 6] = [
    "search",
    "list_notes",
    "create_note",
    "get_note_connections",
    "add_wikilink",
    "graph_search",
];

/// Error type for the update workflow.
#[derive(thiserror::Error, Debug)]
pub enum ProcessorError {
    #[error("No preferred MCP server configured")]
    NoPreferredServer,

    #[error("Failed to read {path}: {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Start(#[from] SupervisorError),
}

/// How a single step ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed { result: Value },
    Failed { error: String },
}

/// One entry of the processing report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepReport {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Completed { .. })
    }
}

/// Report of a workflow that reached the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingReport {
    pub message: String,
    pub commit_info: CommitInfo,
    pub detected_components: Vec<String>,
    pub available_tools: Vec<String>,
    pub processing_results: Vec<StepReport>,
}

/// Result of processing a pending-updates document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Success(ProcessingReport),
    Fallback(ManualInstructions),
}

/// Drives the update workflow through a [`ServerGateway`].
pub struct UpdateProcessor<'a, G: ServerGateway + ?Sized> {
    gateway: &'a G,
    policy: ProcessingPolicy,
}

impl<'a, G: ServerGateway + ?Sized> UpdateProcessor<'a, G> {
    #[must_use]
    pub fn new(gateway: &'a G, policy: ProcessingPolicy) -> Self {
        Self { gateway, policy }
    }

    /// Process the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::NoPreferredServer`] when no server is
    /// configured. Read and start failures are returned only when manual
    /// fallback is disabled.
    pub async fn process(&self, path: &Path) -> Result<ProcessingOutcome, ProcessorError> {
        let server = self
            .policy
            .preferred_server
            .as_deref()
            .ok_or(ProcessorError::NoPreferredServer)?;

        tracing::info!(%server, path = %path.display(), "Processing architecture updates");

        match self.run(server, path).await {
            Ok(report) => Ok(ProcessingOutcome::Success(report)),
            Err(e) if self.policy.fallback_to_manual => {
                tracing::warn!(%server, error = %e, "Processing failed, falling back to manual instructions");
                let content = read_document(path)?;
                Ok(ProcessingOutcome::Fallback(ManualInstructions::new(content)))
            }
            Err(e) => {
                tracing::error!(%server, error = %e, "Processing failed");
                Err(e)
            }
        }
    }

    async fn run(&self, server: &str, path: &Path) -> Result<ProcessingReport, ProcessorError> {
        let document = read_document(path)?;
        self.gateway.ensure_started(server).await?;

        let available_tools = self.discover_tools(server).await;
        let commit_info = CommitInfo::parse(&document);
        tracing::debug!(
            branch = %commit_info.branch,
            commit = %commit_info.commit,
            files = commit_info.files.len(),
            "Parsed commit info"
        );

        let mut results = Vec::new();
        results.push(
            self.call_tool(
                server,
                "architecture_overview_check",
                "list_notes",
                json!({
                    "virtual_folder": "architecture/overview",
                    "tags": ["foundational", "system-design"],
                }),
            )
            .await,
        );

        let components = extract_components(&commit_info.message);
        tracing::info!(?components, "Detected components");

        for component in &components {
            let search = self
                .call_tool(
                    server,
                    &format!("search_{component}"),
                    "search",
                    json!({ "query": component }),
                )
                .await;

            let missing = match &search.outcome {
                StepOutcome::Completed { result } => is_empty_search(result),
                StepOutcome::Failed { .. } => false,
            };
            results.push(search);

            if missing {
                let content = generate_component_note(component, &commit_info, Utc::now());
                results.push(
                    self.call_tool(
                        server,
                        &format!("create_{component}"),
                        "create_note",
                        json!({
                            "title": component,
                            "content": content,
                            "virtual_folder": "architecture/components/",
                            "tags": ["component", "service", "auto-documented"],
                        }),
                    )
                    .await,
                );
            }
        }

        let failed = results.iter().filter(|r| !r.is_completed()).count();
        tracing::info!(steps = results.len(), failed, "Architecture processing completed");

        Ok(ProcessingReport {
            message: "Architecture updates processed via MCP knowledge tools".to_string(),
            commit_info,
            detected_components: components,
            available_tools,
            processing_results: results,
        })
    }

    async fn discover_tools(&self, server: &str) -> Vec<String> {
        match self.gateway.request(server, "tools/list", json!({})).await {
            Ok(result) => match tool_names(&result) {
                Some(tools) => {
                    tracing::info!(tools = %tools.join(", "), "Available tools");
                    return tools;
                }
                None => tracing::info!("Unexpected tools/list result, assuming known tools"),
            },
            Err(e) => tracing::info!(error = %e, "Could not list tools, assuming known tools"),
        }
        FALLBACK_TOOLS.iter().map(ToString::to_string).collect()
    }

    async fn call_tool(&self, server: &str, step: &str, tool: &str, arguments: Value) -> StepReport {
        tracing::debug!(%step, %tool, "Running step");
        let params = json!({ "name": tool, "arguments": arguments });
        let outcome = match self.gateway.request(server, "tools/call", params).await {
            Ok(result) => StepOutcome::Completed { result },
            Err(e) => {
                tracing::warn!(%step, error = %e, "Step failed");
                StepOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        StepReport {
            step: step.to_string(),
            outcome,
        }
    }
}

fn read_document(path: &Path) -> Result<String, ProcessorError> {
    std::fs::read_to_string(path).map_err(|source| ProcessorError::ReadDocument {
        path: path.to_path_buf(),
        source,
    })
}

/// Tool names from a `tools/list` result, either `{tools: [...]}` or a bare array.
fn tool_names(result: &Value) -> Option<Vec<String>> {
    let tools = result
        .get("tools")
        .and_then(Value::as_array)
        .or_else(|| result.as_array())?;

    Some(
        tools
            .iter()
            .filter_map(|tool| match tool {
                Value::String(name) => Some(name.clone()),
                other => other.get("name").and_then(Value::as_str).map(String::from),
            })
            .collect(),
    )
}

fn is_empty_search(result: &Value) -> bool {
    result.is_null()
        || result
            .get("results")
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty)
}
