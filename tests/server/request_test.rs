//! Request correlation through the supervisor.

use std::time::Duration;

use doc_flow::rpc::RpcError;
use doc_flow::server::ServerSupervisor;
use serde_json::json;
use tokio::time::timeout;

use crate::support::{
    sh_server, ECHO_SERVER, ONE_SHOT_SERVER, REJECTING_SERVER, REVERSING_SERVER, SILENT_SERVER,
};

#[tokio::test]
async fn request_round_trips_through_the_process() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", ECHO_SERVER)]);
    supervisor.start("kb").await.unwrap();

    let result = supervisor
        .send_request("kb", "tools/list", json!({ "cursor": "a" }))
        .await
        .unwrap();

    let request = &result["request"];
    assert_eq!(request["jsonrpc"], "2.0");
    assert_eq!(request["method"], "tools/list");
    assert_eq!(request["params"], json!({ "cursor": "a" }));
    assert!(request["id"].as_u64().is_some());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn requests_get_distinct_ids() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", ECHO_SERVER)]);
    supervisor.start("kb").await.unwrap();

    let (a, b, c) = tokio::join!(
        supervisor.send_request("kb", "a", json!({})),
        supervisor.send_request("kb", "b", json!({})),
        supervisor.send_request("kb", "c", json!({})),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(a["request"]["method"], "a");
    assert_eq!(b["request"]["method"], "b");
    assert_eq!(c["request"]["method"], "c");
    let mut ids = vec![
        a["request"]["id"].as_u64().unwrap(),
        b["request"]["id"].as_u64().unwrap(),
        c["request"]["id"].as_u64().unwrap(),
    ];
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn out_of_order_responses_reach_their_callers() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", REVERSING_SERVER)]);
    supervisor.start("kb").await.unwrap();

    let first = supervisor.send_request("kb", "first", json!({}));
    let second = async {
        // Keep the write order deterministic.
        tokio::time::sleep(Duration::from_millis(50)).await;
        supervisor.send_request("kb", "second", json!({})).await
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), json!("first"));
    assert_eq!(second.unwrap(), json!("second"));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn remote_errors_carry_message_and_code() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", REJECTING_SERVER)]);
    supervisor.start("kb").await.unwrap();

    let err = supervisor
        .send_request("kb", "tools/list", json!({}))
        .await
        .unwrap_err();

    match &err {
        RpcError::Remote { code, message, .. } => {
            assert_eq!(*code, Some(-32601));
            assert_eq!(message, "Method not found");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(err.to_string(), "Method not found");

    // The server stays usable.
    assert!(supervisor.is_ready("kb"));
    supervisor.shutdown().await;
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", SILENT_SERVER)])
        .with_request_timeout(Duration::from_millis(200));
    let server = supervisor.start("kb").await.unwrap();

    let err = supervisor
        .send_request("kb", "tools/list", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RpcError::RequestTimeout { timeout_ms: 200, ref method, .. } if method == "tools/list"
    ));
    assert!(server.correlator().pending().is_empty());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn request_to_stopped_server_is_not_ready() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", SILENT_SERVER)]);
    supervisor.start("kb").await.unwrap();
    supervisor.stop("kb");

    let err = supervisor
        .send_request("kb", "tools/list", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::NotReady { ref server } if server == "kb"));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn exit_fails_pending_requests_and_unregisters() {
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", ONE_SHOT_SERVER)]);
    supervisor.start("kb").await.unwrap();

    let err = supervisor
        .send_request("kb", "tools/list", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::ServerExited { ref server } if server == "kb"));

    timeout(Duration::from_secs(10), supervisor.wait_for_exit("kb"))
        .await
        .unwrap();
    assert!(!supervisor.is_running("kb"));
}

#[tokio::test]
async fn invalid_utf8_output_does_not_break_the_server() {
    let script = r#"
echo "MCP server ready"
printf '\377\376 binary log\n'
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -E 's/.*"id":([0-9]+).*/\1/')
  printf '\377 noise\n{"jsonrpc":"2.0","id":%s,"result":"ok"}\n' "$id"
done
"#;
    let supervisor = ServerSupervisor::from_definitions([sh_server("kb", script)]);
    supervisor.start("kb").await.unwrap();

    for _ in 0..2 {
        let result = supervisor
            .send_request("kb", "tools/list", json!({}))
            .await
            .unwrap();
        assert_eq!(result, json!("ok"));
    }

    supervisor.shutdown().await;
}
