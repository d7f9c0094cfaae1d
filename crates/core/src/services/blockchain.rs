//! Blockchain mirror.
//!
//! Accepted votes are copied to an external ledger for display and
//! verification. The mirror is never consulted for admission control and a
//! failed write never fails the vote.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evote_common::{AppResult, sha256_hex};
use serde::Serialize;
use tokio::sync::RwLock;

/// A vote as written to the mirror.
#[derive(Debug, Clone)]
pub struct ChainVote {
    pub voter_id: String,
    pub election_id: String,
    pub candidate_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement of a mirror write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub transaction_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// What the mirror currently holds for a voter in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVoteRecord {
    pub candidate_id: String,
    pub timestamp: DateTime<Utc>,
    pub transaction_hash: String,
    pub has_voted: bool,
}

/// Best-effort external copy of vote records.
#[async_trait]
pub trait BlockchainMirror: Send + Sync {
    /// Write (or overwrite, on revote) the voter's record for an election.
    async fn record_vote(&self, vote: &ChainVote) -> AppResult<ChainReceipt>;

    /// Read back the voter's record for an election.
    async fn vote_status(
        &self,
        voter_id: &str,
        election_id: &str,
    ) -> AppResult<Option<ChainVoteRecord>>;
}

/// Shared mirror handle.
pub type MirrorService = Arc<dyn BlockchainMirror>;

/// Mirror key: the voter id is hashed so the ledger does not expose it.
#[must_use]
pub fn record_key(voter_id: &str, election_id: &str) -> String {
    format!("{}:{election_id}", sha256_hex(voter_id))
}

/// In-process simulated chain.
#[derive(Default)]
pub struct InMemoryChain {
    records: RwLock<HashMap<String, ChainVoteRecord>>,
    nonce: AtomicU64,
}

impl InMemoryChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct (voter, election) records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl BlockchainMirror for InMemoryChain {
    async fn record_vote(&self, vote: &ChainVote) -> AppResult<ChainReceipt> {
        let key = record_key(&vote.voter_id, &vote.election_id);
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let transaction_hash = format!(
            "0x{}",
            sha256_hex(format!(
                "{key}:{}:{}:{nonce}",
                vote.candidate_id,
                vote.timestamp.timestamp_nanos_opt().unwrap_or_default()
            ))
        );

        let record = ChainVoteRecord {
            candidate_id: vote.candidate_id.clone(),
            timestamp: vote.timestamp,
            transaction_hash: transaction_hash.clone(),
            has_voted: true,
        };
        self.records.write().await.insert(key, record);

        Ok(ChainReceipt {
            transaction_hash,
            timestamp: vote.timestamp,
        })
    }

    async fn vote_status(
        &self,
        voter_id: &str,
        election_id: &str,
    ) -> AppResult<Option<ChainVoteRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&record_key(voter_id, election_id))
            .cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn vote(candidate_id: &str) -> ChainVote {
        ChainVote {
            voter_id: "v1".to_string(),
            election_id: "e1".to_string(),
            candidate_id: candidate_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_record_key_hides_voter_id() {
        let key = record_key("v1", "e1");
        assert!(!key.contains("v1"));
        assert!(key.ends_with(":e1"));
        assert_eq!(key.len(), 64 + 3);
    }

    #[tokio::test]
    async fn test_revote_overwrites_record() {
        let chain = InMemoryChain::new();

        let first = chain.record_vote(&vote("a")).await.unwrap();
        let second = chain.record_vote(&vote("b")).await.unwrap();

        assert!(first.transaction_hash.starts_with("0x"));
        assert_eq!(first.transaction_hash.len(), 66);
        assert_ne!(first.transaction_hash, second.transaction_hash);
        assert_eq!(chain.len().await, 1);

        let record = chain.vote_status("v1", "e1").await.unwrap().unwrap();
        assert_eq!(record.candidate_id, "b");
        assert_eq!(record.transaction_hash, second.transaction_hash);
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let chain = InMemoryChain::new();
        assert!(chain.vote_status("v9", "e1").await.unwrap().is_none());
    }
}
