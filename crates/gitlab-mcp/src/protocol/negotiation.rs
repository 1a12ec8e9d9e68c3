//! MCP version negotiation during initialization.

use crate::types::{InitializeParams, InitializeResult, MCP_VERSION};

/// Build the `initialize` result, echoing the client's protocol version.
pub fn negotiate(params: Option<InitializeParams>) -> InitializeResult {
    let params = params.unwrap_or_default();

    if let Some(client) = &params.client_info {
        tracing::info!("Initialized with client: {} v{}", client.name, client.version);
    }

    match params.protocol_version.as_deref() {
        Some(requested) if !requested.is_empty() => {
            if requested != MCP_VERSION {
                tracing::debug!(
                    "Client requested protocol version {requested}, server default is {MCP_VERSION}"
                );
            }
            InitializeResult::for_version(requested)
        }
        _ => InitializeResult::default_result(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echoes_requested_version() {
        let params = InitializeParams {
            protocol_version: Some("2025-03-26".to_string()),
            ..Default::default()
        };
        assert_eq!(negotiate(Some(params)).protocol_version, "2025-03-26");
    }

    #[test]
    fn test_defaults_without_params() {
        let result = negotiate(None);
        assert_eq!(result.protocol_version, MCP_VERSION);
        assert_eq!(result.server_info.name, "gitlab-mcp");
    }
}
