//! MCP protocol handling: JSON-RPC dispatch and batching.

pub mod batch;
pub mod handler;
pub mod negotiation;
pub mod validator;

pub use batch::BatchOutcome;
pub use handler::ProtocolHandler;
