use crate::domain::ports::{ClaimLookup, CorrelationStore};
use crate::domain::transaction::TransactionContext;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::{BuildHasher, RandomState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

const DEFAULT_SHARDS: usize = 16;

#[derive(Debug, Clone)]
struct CorrelationEntry {
    context: TransactionContext,
    inserted_at: Instant,
}

type Shard = RwLock<HashMap<String, CorrelationEntry>>;

/// A thread-safe in-memory correlation store.
///
/// Keys are spread over a fixed set of `RwLock<HashMap>` shards, so
/// operations on different request ids rarely contend on the same lock.
/// `Clone` shares the underlying shards.
#[derive(Clone)]
pub struct InMemoryCorrelationStore {
    shards: Arc<[Shard]>,
    hasher: RandomState,
}

impl Default for InMemoryCorrelationStore {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }
}

impl InMemoryCorrelationStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with `shards` independent locks (at least one).
    pub fn with_shards(shards: usize) -> Self {
        let shards: Vec<Shard> = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            shards: shards.into(),
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, request_id: &str) -> &Shard {
        let index = self.hasher.hash_one(request_id) as usize % self.shards.len();
        &self.shards[index]
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn put(&self, request_id: String, context: TransactionContext) -> Result<bool> {
        let mut shard = self.shard(&request_id).write().await;
        match shard.entry(request_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(CorrelationEntry {
                    context,
                    inserted_at: Instant::now(),
                });
                Ok(true)
            }
        }
    }

    async fn get(&self, request_id: &str) -> Result<Option<TransactionContext>> {
        let shard = self.shard(request_id).read().await;
        Ok(shard.get(request_id).map(|entry| entry.context.clone()))
    }

    async fn remove(&self, request_id: &str) -> Result<Option<TransactionContext>> {
        let mut shard = self.shard(request_id).write().await;
        Ok(shard.remove(request_id).map(|entry| entry.context))
    }

    async fn len(&self) -> Result<usize> {
        let mut total = 0;
        for shard in self.shards.iter() {
            total += shard.read().await.len();
        }
        Ok(total)
    }

    async fn purge_expired(&self, max_age: Duration) -> Result<Vec<(String, TransactionContext)>> {
        let now = Instant::now();
        let mut expired = Vec::new();
        for shard in self.shards.iter() {
            let mut entries = shard.write().await;
            let stale: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.inserted_at) >= max_age)
                .map(|(id, _)| id.clone())
                .collect();
            for id in stale {
                if let Some(entry) = entries.remove(&id) {
                    expired.push((id, entry.context));
                }
            }
        }
        Ok(expired)
    }
}

/// In-memory user claims, keyed by subject.
#[derive(Default, Clone)]
pub struct InMemoryClaimDirectory {
    users: Arc<RwLock<HashMap<String, serde_json::Map<String, serde_json::Value>>>>,
}

impl InMemoryClaimDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, subject: impl Into<String>, name: impl Into<String>, value: serde_json::Value) {
        let mut users = self.users.write().await;
        users.entry(subject.into()).or_default().insert(name.into(), value);
    }
}

#[async_trait]
impl ClaimLookup for InMemoryClaimDirectory {
    async fn claim(&self, subject: &str, name: &str) -> Result<Option<serde_json::Value>> {
        let users = self.users.read().await;
        Ok(users.get(subject).and_then(|claims| claims.get(name)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(ticket: &str) -> TransactionContext {
        TransactionContext::new(ticket, "alice").with_claims(["given_name"])
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = InMemoryCorrelationStore::new();
        store.put("req-123".into(), context("T1")).await.unwrap();

        assert_eq!(store.get("req-123").await.unwrap(), Some(context("T1")));
        assert_eq!(store.len().await.unwrap(), 1);

        assert_eq!(store.remove("req-123").await.unwrap(), Some(context("T1")));
        assert_eq!(store.get("req-123").await.unwrap(), None);
        assert_eq!(store.remove("req-123").await.unwrap(), None);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_keeps_existing_entry() {
        let store = InMemoryCorrelationStore::new();
        assert!(store.put("req-1".into(), context("T1")).await.unwrap());
        assert!(!store.put("req-1".into(), context("T2")).await.unwrap());

        assert_eq!(store.get("req-1").await.unwrap(), Some(context("T1")));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_puts_of_distinct_ids() {
        let store = InMemoryCorrelationStore::with_shards(4);
        let mut handles = Vec::new();
        for i in 0..200 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put(format!("req-{i}"), context(&format!("T{i}")))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 200);
        for i in 0..200 {
            let ctx = store.get(&format!("req-{i}")).await.unwrap().unwrap();
            assert_eq!(ctx.ticket, format!("T{i}"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_only_takes_old_entries() {
        let store = InMemoryCorrelationStore::new();
        store.put("old".into(), context("T1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(90)).await;
        store.put("fresh".into(), context("T2")).await.unwrap();

        let expired = store.purge_expired(Duration::from_secs(60)).await.unwrap();
        assert_eq!(expired, vec![("old".to_string(), context("T1"))]);
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_claim_directory() {
        let claims = InMemoryClaimDirectory::new();
        claims.insert("alice", "given_name", json!("Alice")).await;

        assert_eq!(
            claims.claim("alice", "given_name").await.unwrap(),
            Some(json!("Alice"))
        );
        assert_eq!(claims.claim("alice", "email").await.unwrap(), None);
        assert_eq!(claims.claim("bob", "given_name").await.unwrap(), None);
    }
}
