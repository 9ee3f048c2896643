//! Colored CLI display utilities.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal for server management and update processing.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::processor::{ProcessingOutcome, StepOutcome, StepReport};
use crate::server::ServerStatus;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to at most `max_len` characters, adding an ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Print the configured servers.
pub fn print_server_list(servers: &[ServerStatus]) {
    println!("{}", "Available MCP servers:".bold());
    if servers.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    for server in servers {
        let enabled = if server.enabled {
            "enabled".green().to_string()
        } else {
            "disabled".red().to_string()
        };
        let running = if server.running {
            "running".cyan().to_string()
        } else {
            "stopped".dimmed().to_string()
        };
        println!(
            "  {} [{}] [{}] {}",
            server.name.bold(),
            enabled,
            running,
            truncate(&server.description, DEFAULT_MAX_LEN).dimmed()
        );
    }
    let _ = io::stdout().flush();
}

/// Print that a server is up.
pub fn print_server_started(name: &str, pid: Option<u32>) {
    println!(
        "{} {} {} pid={}",
        timestamp().dimmed(),
        "[START]".green().bold(),
        name.cyan(),
        pid.map_or_else(|| "?".to_string(), |p| p.to_string()).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print the servers that were asked to stop.
pub fn print_servers_stopped(names: &[String]) {
    if names.is_empty() {
        println!(
            "{} {} no running servers",
            timestamp().dimmed(),
            "[STOP]".yellow().bold()
        );
    }
    for name in names {
        println!(
            "{} {} {}",
            timestamp().dimmed(),
            "[STOP]".yellow().bold(),
            name.cyan()
        );
    }
    let _ = io::stdout().flush();
}

fn print_step(report: &StepReport) {
    match &report.outcome {
        StepOutcome::Completed { result } => println!(
            "  {} {} {}",
            "[OK]".green().bold(),
            report.step,
            truncate(&result.to_string(), DEFAULT_MAX_LEN).dimmed()
        ),
        StepOutcome::Failed { error } => println!(
            "  {} {} - {}",
            "[FAILED]".red().bold(),
            report.step,
            truncate(error, 150).dimmed()
        ),
    }
}

/// Print a short summary of a processing outcome.
pub fn print_processing_summary(outcome: &ProcessingOutcome) {
    match outcome {
        ProcessingOutcome::Success(report) => {
            println!(
                "{} {} {} on {} ({} components)",
                timestamp().dimmed(),
                "[PROCESS]".blue().bold(),
                report.commit_info.commit.cyan(),
                report.commit_info.branch,
                report.detected_components.len()
            );
            for step in &report.processing_results {
                print_step(step);
            }
        }
        ProcessingOutcome::Fallback(manual) => {
            println!(
                "{} {} {}",
                timestamp().dimmed(),
                "[FALLBACK]".yellow().bold(),
                manual.message
            );
            for instruction in &manual.instructions {
                println!("  {instruction}");
            }
        }
    }
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}
