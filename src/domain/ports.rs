use super::device::{
    AsyncAuthenticationRequest, AuthenticationAck, PollResultResponse, SyncAuthenticationRequest,
    SyncAuthenticationResponse,
};
use super::transaction::{Completion, TransactionContext};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Maps device-issued request ids to the transactions waiting on them.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Inserts the entry unless `request_id` is already taken. Returns
    /// `false`, leaving the existing entry in place, when it is.
    async fn put(&self, request_id: String, context: TransactionContext) -> Result<bool>;
    async fn get(&self, request_id: &str) -> Result<Option<TransactionContext>>;
    async fn remove(&self, request_id: &str) -> Result<Option<TransactionContext>>;
    async fn len(&self) -> Result<usize>;
    /// Removes and returns every entry older than `max_age`.
    async fn purge_expired(&self, max_age: Duration) -> Result<Vec<(String, TransactionContext)>>;
}

#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn sync_authenticate(
        &self,
        request: &SyncAuthenticationRequest,
    ) -> Result<SyncAuthenticationResponse>;
    async fn async_authenticate(
        &self,
        request: &AsyncAuthenticationRequest,
    ) -> Result<AuthenticationAck>;
    async fn poll_authenticate(
        &self,
        request: &AsyncAuthenticationRequest,
    ) -> Result<AuthenticationAck>;
    async fn poll_result(&self, request_id: &str) -> Result<PollResultResponse>;
}

/// The protocol engine's finalize-transaction contract.
///
/// Must be called at most once per ticket.
#[async_trait]
pub trait ProtocolEngine: Send + Sync {
    async fn complete_transaction(&self, completion: Completion) -> Result<()>;
}

/// Resolves user claims for an authorized completion.
#[async_trait]
pub trait ClaimLookup: Send + Sync {
    async fn claim(&self, subject: &str, name: &str) -> Result<Option<serde_json::Value>>;
}

pub type CorrelationStoreRef = Arc<dyn CorrelationStore>;
pub type DeviceClientRef = Arc<dyn DeviceClient>;
pub type ProtocolEngineRef = Arc<dyn ProtocolEngine>;
pub type ClaimLookupRef = Arc<dyn ClaimLookup>;
