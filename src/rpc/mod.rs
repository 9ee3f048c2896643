//! Line-delimited JSON-RPC request correlation.
//!
//! # Protocol
//!
//! ```text
//! client                               server (child stdin/stdout)
//!   |-- {"jsonrpc":"2.0","id":1,...}\n -->|
//!   |<-- log text ------------------------|   ignored
//!   |<-- {"id":1,"result":{...}}\n -------|   resolves request 1
//! ```
//!
//! Responses may arrive in any order and interleaved with arbitrary log
//! output; each is matched to its request by `id`.

mod correlator;
mod error;
mod pending;
mod types;

pub use correlator::{Correlator, LineDispatch, RequestWriter};
pub use error::RpcError;
pub use pending::PendingRequests;
pub use types::{ParsedResponse, RemoteErrorPayload, RpcRequest, JSONRPC_VERSION};
