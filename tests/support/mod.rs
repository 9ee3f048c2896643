//! Fake stdio servers driven by `sh`.

use doc_flow::config::ServerDefinition;

/// Prints the ready marker, then answers every request with the request itself.
pub const ECHO_SERVER: &str = r#"
echo "MCP server ready" >&2
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -E 's/.*"id":([0-9]+).*/\1/')
  printf '{"jsonrpc":"2.0","id":%s,"result":{"request":%s}}\n' "$id" "$line"
done
"#;

/// Reads two requests and answers them in reverse order.
pub const REVERSING_SERVER: &str = r#"
echo "MCP Server running on stdio"
IFS= read -r first
IFS= read -r second
id1=$(printf '%s\n' "$first" | sed -E 's/.*"id":([0-9]+).*/\1/')
id2=$(printf '%s\n' "$second" | sed -E 's/.*"id":([0-9]+).*/\1/')
printf '{"jsonrpc":"2.0","id":%s,"result":"second"}\n' "$id2"
printf '{"jsonrpc":"2.0","id":%s,"result":"first"}\n' "$id1"
cat >/dev/null
"#;

/// Rejects every request with a remote error.
pub const REJECTING_SERVER: &str = r#"
echo "Server listening"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -E 's/.*"id":([0-9]+).*/\1/')
  printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Method not found"}}\n' "$id"
done
"#;

/// Becomes ready but never answers.
pub const SILENT_SERVER: &str = r#"
echo "MCP server ready"
exec cat >/dev/null
"#;

/// Becomes ready, then exits after the first request.
pub const ONE_SHOT_SERVER: &str = r#"
echo "MCP server ready"
IFS= read -r line
exit 0
"#;

/// Signals readiness only after half a second.
pub const SLOW_SERVER: &str = r#"
sleep 0.5
echo "MCP server ready" >&2
exec cat >/dev/null
"#;

/// A minimal knowledge base: lists tools, finds nothing, accepts new notes.
pub const KNOWLEDGE_SERVER: &str = r#"
echo "Knowledge MCP Server running on stdio" >&2
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -E 's/.*"id":([0-9]+).*/\1/')
  case "$line" in
    *'"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"search"},{"name":"list_notes"},{"name":"create_note"}]}}\n' "$id" ;;
    *'"name":"search"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"results":[]}}\n' "$id" ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"ok":true}}\n' "$id" ;;
  esac
done
"#;

/// An enabled definition running `script` under `sh -c`.
pub fn sh_server(name: &str, script: &str) -> ServerDefinition {
    ServerDefinition::new(name, "sh")
        .with_args(["-c", script])
        .with_timeout_ms(5_000)
}
