//! Stdio transport: newline-delimited JSON-RPC on stdin/stdout.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::{BatchOutcome, ProtocolHandler};
use crate::types::{McpError, McpResult, RequestId};

use super::framing::{self, IncomingMessage};

/// Stdio transport for desktop MCP clients.
pub struct StdioTransport {
    handler: ProtocolHandler,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self { handler }
    }

    /// Run the transport loop until stdin closes.
    pub async fn run(&self) -> McpResult<()> {
        let reader = BufReader::new(tokio::io::stdin());
        self.run_with(reader, tokio::io::stdout()).await
    }

    /// Serve line-by-line over arbitrary streams.
    pub async fn run_with<R, W>(&self, mut reader: R, mut writer: W) -> McpResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();
        tracing::info!("Stdio transport started");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await.map_err(McpError::Io)?;
            if bytes_read == 0 {
                tracing::info!("EOF on stdin, shutting down");
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            if let Some(reply) = self.handle_line(&line).await {
                let framed = framing::frame_message(&reply)?;
                writer
                    .write_all(framed.as_bytes())
                    .await
                    .map_err(McpError::Io)?;
                writer.flush().await.map_err(McpError::Io)?;
            }
        }

        Ok(())
    }

    /// Process one input line; `None` when nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let message = match framing::parse_message(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Parse error: {e}");
                return Some(e.to_response(RequestId::Null).to_value());
            }
        };

        match message {
            IncomingMessage::Single(raw) => self
                .handler
                .dispatch(raw)
                .await
                .into_response()
                .map(|r| r.to_value()),
            IncomingMessage::Batch(items) => match self.handler.dispatch_batch(items).await {
                BatchOutcome::Responses(responses) => Some(Value::Array(
                    responses.iter().map(|r| r.to_value()).collect(),
                )),
                BatchOutcome::NoContent => None,
                BatchOutcome::Rejected(response) => Some(response.to_value()),
            },
        }
    }
}
