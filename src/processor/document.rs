//! Parsing of captured commit documents.
//!
//! A pending-updates document looks like:
//!
//! ```text
//! ## Auto-Captured: 2024-05-01T10:00:00Z
//! **Branch:** main | **Commit:** a1b2c3d
//!
//! ### Commit Message
//! add UserService and new PaymentController
//!
//! ### Files Modified
//! ```
//! src/user_service.rs
//! src/payment_controller.rs
//! ```
//! ```
//!
//! Every field has a fallback so a malformed document still yields a
//! usable [`CommitInfo`].

use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        match Regex::new(r"## Auto-Captured: (.+)\n\*\*Branch:\*\* (.+) \| \*\*Commit:\*\* (.+)") {
            Ok(re) => re,
            Err(_) => unreachable!("static regex pattern is valid"),
        }
    })
}

fn message_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"### Commit Message\n(.+)") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern is valid"),
    })
}

fn files_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"(?s)### Files Modified\n```\n(.+?)\n```") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern is valid"),
    })
}

/// Metadata of one captured commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub timestamp: String,
    pub branch: String,
    pub commit: String,
    pub message: String,
    pub files: Vec<String>,
}

impl CommitInfo {
    /// Parse a document, using the current time for a missing timestamp.
    #[must_use]
    pub fn parse(document: &str) -> Self {
        Self::parse_at(document, Utc::now())
    }

    /// Parse a document, using `now` for a missing timestamp.
    #[must_use]
    pub fn parse_at(document: &str, now: DateTime<Utc>) -> Self {
        let document = document.replace("\r\n", "\n");

        let header = header_regex().captures(&document);
        let field = |index: usize| {
            header
                .as_ref()
                .and_then(|caps| caps.get(index))
                .map(|m| m.as_str().to_string())
        };

        let message = message_regex()
            .captures(&document)
            .and_then(|caps| caps.get(1))
            .map_or_else(|| "No message".to_string(), |m| m.as_str().to_string());

        let files = files_regex()
            .captures(&document)
            .and_then(|caps| caps.get(1))
            .map(|m| {
                m.as_str()
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            timestamp: field(1)
                .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            branch: field(2).unwrap_or_else(|| "unknown".to_string()),
            commit: field(3).unwrap_or_else(|| "unknown".to_string()),
            message,
            files,
        }
    }
}
