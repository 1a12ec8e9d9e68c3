//! Batch coordination: concurrent fan-out, ordered fan-in.

use futures::future::join_all;
use serde_json::Value;

use crate::types::{JsonRpcResponse, McpError, RequestId};

use super::ProtocolHandler;

/// Result of running a whole batch.
#[derive(Debug)]
pub enum BatchOutcome {
    /// One response per id-bearing element, in input order.
    Responses(Vec<JsonRpcResponse>),
    /// Every element was a notification.
    NoContent,
    /// The batch itself was unusable (empty array).
    Rejected(JsonRpcResponse),
}

impl ProtocolHandler {
    /// Dispatch every element concurrently and reassemble by input index.
    pub async fn dispatch_batch(&self, items: Vec<Value>) -> BatchOutcome {
        if items.is_empty() {
            let error = McpError::InvalidRequest("Batch must not be empty".to_string());
            return BatchOutcome::Rejected(error.to_response(RequestId::Null));
        }

        let size = items.len();
        let dispatched = items.into_iter().enumerate().map(|(index, raw)| async move {
            (index, self.dispatch(raw).await)
        });

        let mut outcomes = join_all(dispatched).await;
        outcomes.sort_by_key(|(index, _)| *index);

        let responses: Vec<JsonRpcResponse> = outcomes
            .into_iter()
            .filter_map(|(_, outcome)| outcome.into_response())
            .collect();

        tracing::debug!("Batch of {size} produced {} responses", responses.len());

        if responses.is_empty() {
            BatchOutcome::NoContent
        } else {
            BatchOutcome::Responses(responses)
        }
    }
}
