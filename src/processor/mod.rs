//! Update processing: turns captured commit documents into knowledge-base
//! notes by driving a fixed sequence of tool calls on the preferred server.

mod components;
mod document;
mod gateway;
mod note;
mod workflow;

pub use components::*;
pub use document::*;
pub use gateway::*;
pub use note::*;
pub use workflow::*;
