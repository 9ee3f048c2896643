//! doc-flow - Supervise stdio JSON-RPC servers and document commits through them.

pub mod config;
pub mod display;
pub mod processor;
pub mod rpc;
pub mod server;
