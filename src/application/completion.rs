use crate::domain::ports::{ClaimLookupRef, ProtocolEngineRef};
use crate::domain::transaction::{Completion, CompletionResult, DeviceResult, TransactionContext};
use crate::error::Result;

pub const DENIED_DESCRIPTION: &str = "user denied the authentication request";
pub const TIMEOUT_DESCRIPTION: &str = "authentication timed out";

/// Turns device outcomes into calls on the protocol engine's
/// finalize-transaction contract.
///
/// The dispatcher itself does not deduplicate: callers must hold the
/// transaction's settle right (or have taken the correlation entry) before
/// calling [`CompletionDispatcher::complete`].
#[derive(Clone)]
pub struct CompletionDispatcher {
    engine: ProtocolEngineRef,
    claims: Option<ClaimLookupRef>,
}

impl CompletionDispatcher {
    pub fn new(engine: ProtocolEngineRef) -> Self {
        Self {
            engine,
            claims: None,
        }
    }

    pub fn with_claims(mut self, claims: ClaimLookupRef) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Maps a device result to the completion result and error description.
    pub fn resolve(result: DeviceResult) -> (CompletionResult, Option<String>) {
        match result {
            DeviceResult::Allow => (CompletionResult::Authorized, None),
            DeviceResult::Deny => (
                CompletionResult::AccessDenied,
                Some(DENIED_DESCRIPTION.to_string()),
            ),
            DeviceResult::Timeout => (
                CompletionResult::Failed,
                Some(TIMEOUT_DESCRIPTION.to_string()),
            ),
        }
    }

    /// Completes the transaction according to the device's answer.
    pub async fn complete_with(&self, context: &TransactionContext, result: DeviceResult) -> Result<()> {
        let (result, error_description) = Self::resolve(result);
        self.complete(context, result, error_description).await
    }

    /// Completes the transaction with `Failed`.
    pub async fn fail(&self, context: &TransactionContext, description: impl Into<String>) -> Result<()> {
        self.complete(context, CompletionResult::Failed, Some(description.into()))
            .await
    }

    /// Calls the protocol engine once for this transaction.
    pub async fn complete(
        &self,
        context: &TransactionContext,
        result: CompletionResult,
        error_description: Option<String>,
    ) -> Result<()> {
        let authorized = result == CompletionResult::Authorized;
        let authenticated_at = if authorized {
            chrono::Utc::now().timestamp()
        } else {
            0
        };
        let claims = if authorized {
            self.lookup_claims(context).await
        } else {
            serde_json::Map::new()
        };

        let completion = Completion {
            ticket: context.ticket.clone(),
            result,
            user_subject: context.user_subject.clone(),
            authenticated_at,
            acr: context.requested_acrs.first().cloned(),
            error_description,
            claims,
        };

        tracing::debug!(ticket = %context.ticket, ?result, "completing backchannel transaction");
        self.engine.complete_transaction(completion).await
    }

    async fn lookup_claims(&self, context: &TransactionContext) -> serde_json::Map<String, serde_json::Value> {
        let mut claims = serde_json::Map::new();
        let Some(lookup) = &self.claims else {
            return claims;
        };
        for name in &context.requested_claims {
            match lookup.claim(&context.user_subject, name).await {
                Ok(Some(value)) => {
                    claims.insert(name.clone(), value);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(ticket = %context.ticket, claim = %name, error = %e, "claim lookup failed");
                }
            }
        }
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryClaimDirectory;
    use crate::infrastructure::logging_engine::LoggingProtocolEngine;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> TransactionContext {
        TransactionContext::new("T1", "alice")
            .with_acrs(["urn:acr:mfa", "urn:acr:pwd"])
            .with_claims(["given_name", "email"])
    }

    #[test]
    fn test_resolve_mapping() {
        assert_eq!(
            CompletionDispatcher::resolve(DeviceResult::Allow),
            (CompletionResult::Authorized, None)
        );
        assert_eq!(
            CompletionDispatcher::resolve(DeviceResult::Deny).0,
            CompletionResult::AccessDenied
        );
        assert_eq!(
            CompletionDispatcher::resolve(DeviceResult::Timeout).0,
            CompletionResult::Failed
        );
    }

    #[tokio::test]
    async fn test_authorized_completion_carries_auth_time_acr_and_claims() {
        let engine = LoggingProtocolEngine::new();
        let claims = InMemoryClaimDirectory::new();
        claims.insert("alice", "given_name", json!("Alice")).await;
        let dispatcher =
            CompletionDispatcher::new(Arc::new(engine.clone())).with_claims(Arc::new(claims));

        dispatcher
            .complete_with(&context(), DeviceResult::Allow)
            .await
            .unwrap();

        let completions = engine.completions().await;
        assert_eq!(completions.len(), 1);
        let completion = &completions[0];
        assert_eq!(completion.ticket, "T1");
        assert_eq!(completion.result, CompletionResult::Authorized);
        assert!(completion.authenticated_at > 0);
        assert_eq!(completion.acr.as_deref(), Some("urn:acr:mfa"));
        assert_eq!(completion.error_description, None);
        assert_eq!(completion.claims.get("given_name"), Some(&json!("Alice")));
        assert!(!completion.claims.contains_key("email"));
    }

    #[tokio::test]
    async fn test_denied_completion_has_no_auth_time() {
        let engine = LoggingProtocolEngine::new();
        let dispatcher = CompletionDispatcher::new(Arc::new(engine.clone()));

        dispatcher
            .complete_with(&context(), DeviceResult::Deny)
            .await
            .unwrap();

        let completions = engine.completions().await;
        assert_eq!(completions[0].result, CompletionResult::AccessDenied);
        assert_eq!(completions[0].authenticated_at, 0);
        assert_eq!(
            completions[0].error_description.as_deref(),
            Some(DENIED_DESCRIPTION)
        );
        assert!(completions[0].claims.is_empty());
    }
}
