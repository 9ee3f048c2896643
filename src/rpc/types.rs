//! Wire message types.
//!
//! Requests go out as one JSON object per line. Inbound lines are decoded
//! loosely: anything that is a JSON object with a non-null `id` counts as a
//! response, everything else is treated as log text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version tag sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    /// Build a request with the current protocol version.
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Serialize to a single newline-terminated line.
    ///
    /// # Errors
    ///
    /// Returns an error if the params cannot be serialized.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Error payload carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteErrorPayload {
    pub code: Option<i64>,
    pub message: String,
}

impl RemoteErrorPayload {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                code: map.get("code").and_then(Value::as_i64),
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown remote error")
                    .to_string(),
            },
            Value::String(message) => Self {
                code: None,
                message: message.clone(),
            },
            other => Self {
                code: None,
                message: other.to_string(),
            },
        }
    }
}

/// A decoded inbound message that carries a correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub id: Value,
    pub result: Option<Value>,
    pub error: Option<RemoteErrorPayload>,
    pub raw: Value,
}

impl ParsedResponse {
    /// Decode one line of output.
    ///
    /// Returns `None` for blank lines, non-JSON text, and JSON values that
    /// are not objects with an `id`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let raw: Value = serde_json::from_str(line).ok()?;
        let object = raw.as_object()?;
        let id = object.get("id").filter(|v| !v.is_null())?.clone();
        let result = object.get("result").filter(|v| !v.is_null()).cloned();
        let error = object
            .get("error")
            .filter(|v| !v.is_null())
            .map(RemoteErrorPayload::from_value);

        Some(Self {
            id,
            result,
            error,
            raw,
        })
    }

    /// Correlation id as an integer, accepting numeric strings.
    #[must_use]
    pub fn id_u64(&self) -> Option<u64> {
        match &self.id {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Split into the result payload or the remote error.
    ///
    /// Without an explicit `result`, the whole message is the payload.
    ///
    /// # Errors
    ///
    /// Returns the remote error payload when the message carries `error`.
    pub fn into_result(self) -> Result<Value, RemoteErrorPayload> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(self.result.unwrap_or(self.raw))
    }
}
