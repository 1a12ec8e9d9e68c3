//! GitLab MCP server: JSON-RPC 2.0 tool gateway over HTTP and stdio, with
//! per-caller encrypted GitLab credentials.

pub mod api;
pub mod config;
pub mod gitlab;
pub mod logging;
pub mod protocol;
pub mod tools;
pub mod transport;
pub mod types;

pub use protocol::ProtocolHandler;
pub use tools::{ToolContext, ToolProfile, ToolRegistry};
pub use transport::{HttpTransport, StdioTransport};
