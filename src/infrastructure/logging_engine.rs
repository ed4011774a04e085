use crate::domain::ports::ProtocolEngine;
use crate::domain::transaction::Completion;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A protocol engine stand-in that logs every completion.
///
/// [`LoggingProtocolEngine::log_only`] is what the standalone binary runs
/// with. [`LoggingProtocolEngine::new`] additionally keeps a copy of each
/// completion for callers that need to observe them.
#[derive(Default, Clone)]
pub struct LoggingProtocolEngine {
    recorded: Option<Arc<Mutex<Vec<Completion>>>>,
}

impl LoggingProtocolEngine {
    /// A recording engine.
    pub fn new() -> Self {
        Self {
            recorded: Some(Arc::default()),
        }
    }

    /// An engine that only logs; `completions()` stays empty.
    pub fn log_only() -> Self {
        Self::default()
    }

    pub async fn completions(&self) -> Vec<Completion> {
        match &self.recorded {
            Some(recorded) => recorded.lock().await.clone(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl ProtocolEngine for LoggingProtocolEngine {
    async fn complete_transaction(&self, completion: Completion) -> Result<()> {
        tracing::info!(
            ticket = %completion.ticket,
            result = ?completion.result,
            subject = %completion.user_subject,
            authenticated_at = completion.authenticated_at,
            error = completion.error_description.as_deref().unwrap_or(""),
            "backchannel transaction completed"
        );
        if let Some(recorded) = &self.recorded {
            recorded.lock().await.push(completion);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::CompletionResult;

    fn completion(ticket: &str) -> Completion {
        Completion {
            ticket: ticket.into(),
            result: CompletionResult::Failed,
            user_subject: "alice".into(),
            authenticated_at: 0,
            acr: None,
            error_description: Some("authentication device did not respond".into()),
            claims: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_recording_engine_keeps_completions() {
        let engine = LoggingProtocolEngine::new();
        engine.complete_transaction(completion("T1")).await.unwrap();
        engine.complete_transaction(completion("T2")).await.unwrap();

        let tickets: Vec<_> = engine.completions().await.into_iter().map(|c| c.ticket).collect();
        assert_eq!(tickets, ["T1", "T2"]);
    }

    #[tokio::test]
    async fn test_log_only_engine_keeps_nothing() {
        let engine = LoggingProtocolEngine::log_only();
        engine.complete_transaction(completion("T1")).await.unwrap();

        assert!(engine.completions().await.is_empty());
    }
}
