//! Templated documentation content.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::processor::CommitInfo;

/// Steps handed to a human when automated processing is unavailable.
pub const MANUAL_INSTRUCTIONS: [&str; 3] = [
    "1. Review the pending updates in your knowledge management system",
    "2. Process the captured architecture changes manually",
    "3. Update your documentation following project conventions",
];

/// Render the knowledge-base note for a newly detected component.
#[must_use]
pub fn generate_component_note(component: &str, commit: &CommitInfo, now: DateTime<Utc>) -> String {
    let mut files = String::new();
    for (i, file) in commit.files.iter().enumerate() {
        if i > 0 {
            files.push('\n');
        }
        let _ = write!(files, "- `{file}`");
    }

    format!(
        "# {component}

**Type:** Component\x20\x20
**Added:** {added}\x20\x20
**Source Commit:** {hash} on {branch}\x20\x20
**Status:** #auto-documented #component #service

## Purpose
{component} component added via commit: \"{message}\"

## Files
{files}

## Dependencies (Upstream)
<!-- Add dependencies here -->

## Used By (Downstream)
<!-- Add dependents here -->

## Key Methods
<!-- Document main methods/functionality -->

## Integration Points
<!-- Document external connections -->

## Related Architecture
<!-- Add wikilinks to related components -->

---
**Auto-generated:** {generated}\x20\x20
**Source:** doc-flow MCP integration",
        added = now.format("%Y-%m-%d"),
        hash = commit.commit,
        branch = commit.branch,
        message = commit.message,
        generated = now.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Instructions returned instead of a processing report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualInstructions {
    pub message: String,
    pub instructions: Vec<String>,
    pub content: String,
}

impl ManualInstructions {
    /// Wrap the pending document with the fixed manual steps.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            message: "MCP processing failed, manual processing required".to_string(),
            instructions: MANUAL_INSTRUCTIONS.iter().map(ToString::to_string).collect(),
            content: content.into(),
        }
    }
}
