use super::completion::CompletionDispatcher;
use crate::domain::ports::CorrelationStoreRef;
use crate::domain::transaction::DeviceResult;
use serde::Deserialize;
use thiserror::Error;

/// Body the authentication device posts once the user has answered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CallbackRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Reasons a device callback is rejected.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("missing result")]
    MissingResult,

    #[error("unrecognized result: {0}")]
    InvalidResult(String),

    #[error("missing request id")]
    MissingRequestId,

    /// Never stored, already completed, or expired.
    #[error("unknown request id: {0}")]
    UnknownRequestId(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CallbackError {
    /// Whether the caller sent something we cannot act on, as opposed to a
    /// failure on our side.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

/// Resumes async-mode transactions when the device calls back.
///
/// Each callback goes `Received → Validated → Resolved`. The correlation
/// entry is taken out of the store before completion, so of two callbacks
/// racing on the same request id only one can complete the transaction.
#[derive(Clone)]
pub struct CallbackReceiver {
    store: CorrelationStoreRef,
    dispatcher: CompletionDispatcher,
}

impl CallbackReceiver {
    pub fn new(store: CorrelationStoreRef, dispatcher: CompletionDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn handle(&self, request: CallbackRequest) -> Result<(), CallbackError> {
        let result: DeviceResult = match request.result.as_deref() {
            None | Some("") => return Err(CallbackError::MissingResult),
            Some(raw) => raw
                .parse()
                .map_err(|_| CallbackError::InvalidResult(raw.to_string()))?,
        };
        let request_id = match request.request_id.as_deref() {
            None | Some("") => return Err(CallbackError::MissingRequestId),
            Some(id) => id,
        };

        let context = self
            .store
            .remove(request_id)
            .await
            .map_err(|e| CallbackError::Internal(e.to_string()))?
            .ok_or_else(|| CallbackError::UnknownRequestId(request_id.to_string()))?;

        tracing::info!(
            ticket = %context.ticket,
            request_id,
            ?result,
            state = request.state.as_deref().unwrap_or(""),
            "device callback received"
        );

        self.dispatcher
            .complete_with(&context, result)
            .await
            .map_err(|e| {
                tracing::error!(ticket = %context.ticket, request_id, error = %e, "callback completion failed");
                CallbackError::Internal(e.to_string())
            })
    }
}
