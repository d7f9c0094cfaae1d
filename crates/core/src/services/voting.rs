//! Voting service: the tally reconciler.
//!
//! Every transport (the canonical `cast-vote` route, the per-election route,
//! admin tooling) goes through [`VotingService::cast_vote`]. A vote is applied
//! to the election's tally and the voter's ledger in one database transaction
//! while holding the election's lock, so concurrent votes for one election
//! are serialized within this process and guarded by the row version across
//! processes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use evote_common::{AppError, AppResult, IdGenerator, TallyError, VoteEffect};
use evote_db::{
    entities::{election::ElectionStatus, voting_history},
    repositories::{ElectionRepository, VoteCommit, VoterRepository, VotingRepository},
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::admin::{AdminActionKind, AdminActionLog};
use super::blockchain::{ChainVote, MirrorService};

/// Lock table size above which idle entries are pruned.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// One vote request, whatever transport it arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    pub voter_id: String,
    pub election_id: String,
    pub candidate_id: String,
}

/// Outcome of an accepted vote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub election_id: String,
    pub candidate_id: String,
    /// The chosen candidate's count after this vote.
    pub vote_count: u64,
    pub is_revote: bool,
    /// Set when the vote moved away from another candidate.
    pub previous_candidate_id: Option<String>,
    /// The voter's full history after this vote, most recent first.
    pub voting_history: Vec<voting_history::Model>,
    /// The voter's election → voted map after this vote.
    pub has_voted: serde_json::Value,
}

/// Mirror read-back part of [`VoteStatus`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub recorded: bool,
    pub transaction_hash: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A voter's standing in one election.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub has_voted: bool,
    pub candidate_id: Option<String>,
    pub voted_at: Option<DateTime<Utc>>,
    pub is_revote: bool,
    pub blockchain: ChainStatus,
}

/// Counters for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStats {
    pub total_elections: u64,
    pub active_elections: u64,
    pub total_voters: u64,
    pub verified_voters: u64,
    /// Distinct (voter, election) pairs that have voted.
    pub total_votes: u64,
}

/// Per-election async mutexes.
#[derive(Clone, Default)]
pub struct ElectionLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ElectionLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `election_id`.
    pub async fn acquire(&self, election_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks
                .entry(election_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Voting service for business logic.
#[derive(Clone)]
pub struct VotingService {
    election_repo: ElectionRepository,
    voter_repo: VoterRepository,
    voting_repo: VotingRepository,
    mirror: Option<MirrorService>,
    locks: ElectionLocks,
    action_log: AdminActionLog,
    require_verified: bool,
    id_gen: IdGenerator,
}

impl VotingService {
    /// Create a new voting service.
    #[must_use]
    pub fn new(
        election_repo: ElectionRepository,
        voter_repo: VoterRepository,
        voting_repo: VotingRepository,
        action_log: AdminActionLog,
        require_verified: bool,
    ) -> Self {
        Self {
            election_repo,
            voter_repo,
            voting_repo,
            mirror: None,
            locks: ElectionLocks::new(),
            action_log,
            require_verified,
            id_gen: IdGenerator::new(),
        }
    }

    /// Mirror accepted votes to `mirror`.
    #[must_use]
    pub fn with_mirror(mut self, mirror: MirrorService) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Apply a first vote or revote.
    ///
    /// Either the tally, the voter's history entry and `has_voted` all change,
    /// or nothing does and the error is returned.
    pub async fn cast_vote(&self, vote: CastVote) -> AppResult<VoteReceipt> {
        let _guard = self.locks.acquire(&vote.election_id).await;

        let election = self.election_repo.get_by_id(&vote.election_id).await?;
        if election.status != ElectionStatus::Active {
            return Err(AppError::InvalidState(format!(
                "Election is not accepting votes (status: {})",
                election.status.as_str()
            )));
        }

        let candidates = self.election_repo.find_candidates(&election.id).await?;
        if !candidates.iter().any(|c| c.id == vote.candidate_id) {
            return Err(AppError::NotFound(format!(
                "Candidate not found: {}",
                vote.candidate_id
            )));
        }

        let voter = self.voter_repo.get_by_id(&vote.voter_id).await?;
        if self.require_verified && !voter.is_verified {
            return Err(AppError::VerificationFailed(
                "Voter must complete OTP and biometric verification before voting".to_string(),
            ));
        }

        let entry = self
            .voting_repo
            .find_history_entry(&voter.id, &election.id)
            .await?;
        let ledger_says_voted = voter.has_voted_in(&election.id) || entry.is_some();

        let mut tally = election.tally()?;
        for c in &candidates {
            if !tally.has_candidate(&c.id) {
                tally.add_candidate(c.id.clone());
            }
        }
        let effect = tally
            .apply(&voter.id, &vote.candidate_id)
            .map_err(|TallyError::UnknownCandidate(id)| {
                AppError::NotFound(format!("Candidate not found: {id}"))
            })?;
        let is_revote = ledger_says_voted || effect.is_revote();

        if effect == VoteEffect::Unchanged {
            debug!(
                election_id = %election.id,
                voter_id = %voter.id,
                "Same candidate re-submitted; nothing to write"
            );
            let voting_history = match self.voting_repo.find_history_by_voter(&voter.id).await {
                Ok(history) => history,
                Err(e) => {
                    warn!(
                        error = %e,
                        voter_id = %voter.id,
                        "History read failed; answering with this election's entry"
                    );
                    entry.into_iter().collect()
                }
            };
            return Ok(VoteReceipt {
                election_id: election.id,
                candidate_id: vote.candidate_id.clone(),
                vote_count: tally.votes_for(&vote.candidate_id),
                is_revote,
                previous_candidate_id: None,
                voting_history,
                has_voted: voter.has_voted,
            });
        }

        let vote_count = tally.votes_for(&vote.candidate_id);
        let commit = VoteCommit {
            election_id: election.id.clone(),
            expected_version: election.version,
            votes: json!(tally.votes()),
            voter_choices: json!(tally.choices()),
            voter_id: voter.id.clone(),
            candidate_id: vote.candidate_id.clone(),
            history_id: self.id_gen.generate(),
            is_revote,
            voted_at: Utc::now(),
        };
        let committed = self.voting_repo.commit_vote(commit).await?;

        info!(
            election_id = %election.id,
            voter_id = %voter.id,
            is_revote,
            "Vote recorded"
        );
        self.action_log
            .record(
                AdminActionKind::VoteCast,
                Some(&election.id),
                Some(&voter.id),
                if is_revote { "Vote changed" } else { "Vote cast" },
            )
            .await;

        if let Some(mirror) = &self.mirror {
            self.spawn_mirror_write(
                mirror.clone(),
                ChainVote {
                    voter_id: voter.id.clone(),
                    election_id: election.id.clone(),
                    candidate_id: vote.candidate_id.clone(),
                    timestamp: committed.history.voted_at.with_timezone(&Utc),
                },
                committed.history.voted_at,
            );
        }

        Ok(VoteReceipt {
            election_id: election.id,
            candidate_id: vote.candidate_id,
            vote_count,
            is_revote,
            previous_candidate_id: effect.previous().map(str::to_string),
            voting_history: committed.voting_history,
            has_voted: committed.voter.has_voted,
        })
    }

    /// The voter's ledger entry for an election plus the mirror's copy.
    pub async fn vote_status(&self, voter_id: &str, election_id: &str) -> AppResult<VoteStatus> {
        let voter = self.voter_repo.get_by_id(voter_id).await?;
        let entry = self
            .voting_repo
            .find_history_entry(voter_id, election_id)
            .await?;

        let blockchain = match &self.mirror {
            Some(mirror) => match mirror.vote_status(voter_id, election_id).await {
                Ok(Some(record)) => ChainStatus {
                    recorded: record.has_voted,
                    transaction_hash: Some(record.transaction_hash),
                    timestamp: Some(record.timestamp),
                },
                Ok(None) => ChainStatus::default(),
                Err(e) => {
                    warn!(error = %e, voter_id = %voter_id, "Mirror read-back failed");
                    ChainStatus::default()
                }
            },
            None => ChainStatus::default(),
        };

        Ok(VoteStatus {
            has_voted: voter.has_voted_in(election_id) || entry.is_some(),
            candidate_id: entry.as_ref().map(|e| e.candidate_id.clone()),
            voted_at: entry.as_ref().map(|e| e.voted_at.with_timezone(&Utc)),
            is_revote: entry.as_ref().is_some_and(|e| e.is_revote),
            blockchain,
        })
    }

    /// Dashboard counters.
    pub async fn stats(&self) -> AppResult<VotingStats> {
        Ok(VotingStats {
            total_elections: self.election_repo.count(None).await?,
            active_elections: self
                .election_repo
                .count(Some(ElectionStatus::Active))
                .await?,
            total_voters: self.voter_repo.count().await?,
            verified_voters: self.voter_repo.count_verified().await?,
            total_votes: self.voting_repo.count(None).await?,
        })
    }

    fn spawn_mirror_write(
        &self,
        mirror: MirrorService,
        vote: ChainVote,
        voted_at: DateTimeWithTimeZone,
    ) {
        let voting_repo = self.voting_repo.clone();
        tokio::spawn(async move {
            match mirror.record_vote(&vote).await {
                Ok(receipt) => {
                    match voting_repo
                        .set_blockchain_tx_hash(
                            &vote.voter_id,
                            &vote.election_id,
                            &vote.candidate_id,
                            voted_at,
                            &receipt.transaction_hash,
                        )
                        .await
                    {
                        Ok(true) => debug!(
                            election_id = %vote.election_id,
                            tx = %receipt.transaction_hash,
                            "Vote mirrored"
                        ),
                        Ok(false) => debug!(
                            election_id = %vote.election_id,
                            "Mirror receipt superseded by a newer vote"
                        ),
                        Err(e) => warn!(error = %e, "Failed to store mirror transaction hash"),
                    }
                }
                Err(e) => warn!(
                    error = %e,
                    election_id = %vote.election_id,
                    "Blockchain mirror write failed"
                ),
            }
        });
    }
}
