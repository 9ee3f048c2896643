//! Start, readiness and stop behavior against real child processes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use doc_flow::config::ServerDefinition;
use doc_flow::server::{ServerState, ServerSupervisor, SupervisorError};
use tokio::time::timeout;

use crate::support::{sh_server, ECHO_SERVER, SILENT_SERVER, SLOW_SERVER};

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn start_waits_for_ready_marker() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", ECHO_SERVER)]);

    let server = supervisor.start("kb").await.unwrap();

    assert_eq!(server.state(), ServerState::Ready);
    assert!(supervisor.is_running("kb"));
    assert!(supervisor.is_ready("kb"));
    assert!(server.pid().is_some());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn start_is_idempotent() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", SILENT_SERVER)]);

    let first = supervisor.start("kb").await.unwrap();
    let second = supervisor.start("kb").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.instance(), second.instance());
    assert_eq!(supervisor.running(), vec!["kb".to_string()]);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn concurrent_starts_spawn_one_process() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", SILENT_SERVER)]);

    let (a, b) = tokio::join!(supervisor.start("kb"), supervisor.start("kb"));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(supervisor.registry().len(), 1);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn server_without_marker_times_out() {
    let definition = ServerDefinition::new("echo", "echo")
        .with_args(["hello"])
        .with_timeout_ms(1_000);
    let supervisor = ServerSupervisor::from_definitions([definition]);

    let started = Instant::now();
    let err = supervisor.start("echo").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        SupervisorError::StartTimeout { ref name, timeout_ms: 1_000 } if name == "echo"
    ));
    assert_eq!(err.to_string(), "Server 'echo' did not start within 1000ms");
    assert!(elapsed >= Duration::from_millis(900), "returned after {elapsed:?}");

    // echo exits on its own; the exit watcher unregisters it.
    timeout(WAIT, supervisor.wait_for_exit("echo")).await.unwrap();
    assert!(!supervisor.is_running("echo"));
}

#[tokio::test]
async fn timed_out_server_stays_registered_and_can_become_ready() {
    let definition = sh_server("slow", SLOW_SERVER).with_timeout_ms(100);
    let supervisor = ServerSupervisor::from_definitions([definition]);

    let err = supervisor.start("slow").await.unwrap_err();
    assert!(matches!(err, SupervisorError::StartTimeout { .. }));

    let server = supervisor.get("slow").unwrap();
    assert_eq!(server.state(), ServerState::TimedOut);
    assert!(!server.is_ready());

    let mut state = server.subscribe();
    timeout(WAIT, state.wait_for(|s| s.is_ready()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(server.state(), ServerState::Ready);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn custom_ready_marker_is_honored() {
    let definition = sh_server("kb", "echo 'kb online'; exec cat >/dev/null")
        .with_ready_marker("kb online");
    let supervisor = ServerSupervisor::from_definitions([definition]);

    let server = supervisor.start("kb").await.unwrap();
    assert!(server.is_ready());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn stderr_noise_is_not_a_failure() {
    let script = "echo 'deprecation warning' >&2; echo 'MCP server ready' >&2; exec cat >/dev/null";
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", script)]);

    let server = supervisor.start("kb").await.unwrap();
    assert!(server.is_ready());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn stop_unregisters_and_terminates() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", SILENT_SERVER)]);
    let server = supervisor.start("kb").await.unwrap();

    assert!(supervisor.stop("kb"));
    assert!(!supervisor.is_running("kb"));
    assert_eq!(server.state(), ServerState::Stopped);

    timeout(WAIT, server.wait_exited()).await.unwrap();
    assert!(server.has_exited());

    assert!(!supervisor.stop("kb"));
}

#[tokio::test]
async fn restart_after_stop_is_a_new_instance() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", SILENT_SERVER)]);

    let first = supervisor.start("kb").await.unwrap();
    supervisor.stop("kb");
    let second = supervisor.start("kb").await.unwrap();

    assert_ne!(first.instance(), second.instance());

    // The old instance exiting must not unregister the new one.
    timeout(WAIT, first.wait_exited()).await.unwrap();
    assert!(supervisor.is_running("kb"));
    let current = supervisor.get("kb").unwrap();
    assert!(Arc::ptr_eq(&current, &second));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn stop_all_stops_in_name_order() {
    let supervisor = ServerSupervisor::from_definitions([
        sh_server("beta", SILENT_SERVER),
        sh_server("alpha", SILENT_SERVER),
    ]);
    supervisor.start("beta").await.unwrap();
    supervisor.start("alpha").await.unwrap();

    let stopped = supervisor.stop_all();

    assert_eq!(stopped, vec!["alpha".to_string(), "beta".to_string()]);
    assert!(supervisor.running().is_empty());
    supervisor.shutdown().await;
}

#[tokio::test]
async fn list_reports_running_servers() {
    let supervisor = ServerSupervisor::from_definitions([
        sh_server("kb", SILENT_SERVER).with_description("Knowledge base"),
        sh_server("off", SILENT_SERVER).enabled(false),
    ]);
    supervisor.start("kb").await.unwrap();

    let list = supervisor.list();

    assert_eq!(list.len(), 2);
    assert_eq!(list[0].name, "kb");
    assert_eq!(list[0].description, "Knowledge base");
    assert!(list[0].enabled && list[0].running);
    assert_eq!(list[0].state, Some(ServerState::Ready));
    assert_eq!(list[1].name, "off");
    assert!(!list[1].enabled && !list[1].running);
    assert_eq!(list[1].state, None);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn marker_without_trailing_newline_is_detected() {
    let script = "printf 'MCP server ready' >&2; exec cat >/dev/null";
    let supervisor =
        ServerSupervisor::from_definitions([sh_server("kb", script).with_timeout_ms(1_000)]);

    let server = supervisor.start("kb").await.unwrap();
    assert!(server.is_ready());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn marker_then_immediate_exit_still_starts() {
    let supervisor = ServerSupervisor::from_definitions([
        sh_server("kb", "echo 'MCP server ready'").with_timeout_ms(1_000)
    ]);

    let started = Instant::now();
    let server = supervisor.start("kb").await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(900));
    assert!(server.marker_seen());
    timeout(WAIT, server.wait_exited()).await.unwrap();
    assert!(!supervisor.is_running("kb"));
}
