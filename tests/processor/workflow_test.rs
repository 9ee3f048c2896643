//! The update workflow against a scripted knowledge server.

use std::io::Write;

use doc_flow::config::ProcessingPolicy;
use doc_flow::processor::{ProcessingOutcome, ProcessorError, UpdateProcessor};
use doc_flow::server::{ServerSupervisor, SupervisorError};
use tempfile::NamedTempFile;

use crate::support::{sh_server, KNOWLEDGE_SERVER};

const DOCUMENT: &str = "# Pending Architecture Updates

## Auto-Captured: 2024-05-01 10:00:00
**Branch:** main | **Commit:** a1b2c3d

### Commit Message
add UserService and new PaymentController

### Files Modified
```
src/services/user.rs
src/controllers/payment.rs
```
";

fn pending_document() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DOCUMENT.as_bytes()).unwrap();
    file
}

fn policy(server: &str, fallback: bool) -> ProcessingPolicy {
    ProcessingPolicy {
        preferred_server: Some(server.to_string()),
        fallback_to_manual: fallback,
    }
}

#[tokio::test]
async fn documents_new_components() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", KNOWLEDGE_SERVER)]);
    let file = pending_document();

    let outcome = UpdateProcessor::new(&supervisor, policy("kb", false))
        .process(file.path())
        .await
        .unwrap();
    supervisor.shutdown().await;

    let ProcessingOutcome::Success(report) = outcome else {
        panic!("expected success");
    };
    assert_eq!(report.commit_info.commit, "a1b2c3d");
    assert_eq!(report.commit_info.files.len(), 2);
    assert_eq!(report.available_tools, vec!["search", "list_notes", "create_note"]);
    assert_eq!(
        report.detected_components,
        vec!["UserService", "PaymentController"]
    );

    let steps: Vec<_> = report
        .processing_results
        .iter()
        .map(|r| r.step.as_str())
        .collect();
    assert_eq!(
        steps,
        vec![
            "architecture_overview_check",
            "search_UserService",
            "create_UserService",
            "search_PaymentController",
            "create_PaymentController",
        ]
    );
    assert!(report.processing_results.iter().all(|r| r.is_completed()));
}

#[tokio::test]
async fn disabled_server_falls_back_to_manual_instructions() {
    let supervisor = ServerSupervisor::from_definitions([
        sh_server("kb", KNOWLEDGE_SERVER).enabled(false)
    ]);
    let file = pending_document();

    let outcome = UpdateProcessor::new(&supervisor, policy("kb", true))
        .process(file.path())
        .await
        .unwrap();

    let ProcessingOutcome::Fallback(manual) = outcome else {
        panic!("expected fallback");
    };
    assert_eq!(manual.content, DOCUMENT);
    assert_eq!(
        manual.message,
        "MCP processing failed, manual processing required"
    );
    assert!(!supervisor.is_running("kb"));
}

#[tokio::test]
async fn unknown_server_error_propagates_without_fallback() {
    let supervisor = ServerSupervisor::default();
    let file = pending_document();

    let err = UpdateProcessor::new(&supervisor, policy("kb", false))
        .process(file.path())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProcessorError::Start(SupervisorError::NotFound(ref name)) if name == "kb"
    ));
    assert_eq!(err.to_string(), "Server 'kb' not found in configuration");
}
