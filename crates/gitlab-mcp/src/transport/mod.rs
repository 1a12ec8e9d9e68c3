//! Transport layer for MCP communication.

pub mod framing;
pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;
