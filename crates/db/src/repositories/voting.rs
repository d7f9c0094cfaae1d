//! Voting repository: the voter ledger's history and the atomic vote commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{db_err, flatten_txn_error};
use crate::entities::{
    Election, Voter, VotingHistory, election, election::ElectionStatus, voter, voting_history,
};
use evote_common::{AppError, AppResult};

/// Everything one accepted vote writes.
#[derive(Debug, Clone)]
pub struct VoteCommit {
    pub election_id: String,
    /// `election.version` the new tally was computed from.
    pub expected_version: i32,
    /// New `votes` column value.
    pub votes: JsonValue,
    /// New `voter_choices` column value.
    pub voter_choices: JsonValue,
    pub voter_id: String,
    pub candidate_id: String,
    /// ID for the history entry if the voter has none for this election yet.
    pub history_id: String,
    pub is_revote: bool,
    pub voted_at: DateTime<Utc>,
}

/// Result of a successful [`VotingRepository::commit_vote`].
#[derive(Debug, Clone)]
pub struct CommittedVote {
    pub history: voting_history::Model,
    /// The voter's whole history as of the commit, most recent first.
    pub voting_history: Vec<voting_history::Model>,
    pub voter: voter::Model,
    pub election_version: i32,
}

/// Voting repository for database operations.
#[derive(Clone)]
pub struct VotingRepository {
    db: Arc<DatabaseConnection>,
}

impl VotingRepository {
    /// Create a new voting repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// A voter's history entry for one election.
    pub async fn find_history_entry(
        &self,
        voter_id: &str,
        election_id: &str,
    ) -> AppResult<Option<voting_history::Model>> {
        find_entry(self.db.as_ref(), voter_id, election_id).await
    }

    /// A voter's history, most recent first.
    pub async fn find_history_by_voter(
        &self,
        voter_id: &str,
    ) -> AppResult<Vec<voting_history::Model>> {
        history_of(self.db.as_ref(), voter_id).await
    }

    /// Attach a mirror transaction hash to the entry if it is still the vote
    /// that was mirrored.
    ///
    /// A revote rewrites `candidate_id` and `voted_at`, so a slow receipt for
    /// an older vote (even one for the same candidate) is dropped.
    pub async fn set_blockchain_tx_hash(
        &self,
        voter_id: &str,
        election_id: &str,
        candidate_id: &str,
        voted_at: DateTimeWithTimeZone,
        tx_hash: &str,
    ) -> AppResult<bool> {
        let result = VotingHistory::update_many()
            .col_expr(
                voting_history::Column::BlockchainTxHash,
                Expr::value(tx_hash.to_string()),
            )
            .filter(voting_history::Column::VoterId.eq(voter_id))
            .filter(voting_history::Column::ElectionId.eq(election_id))
            .filter(voting_history::Column::CandidateId.eq(candidate_id))
            .filter(voting_history::Column::VotedAt.eq(voted_at))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    /// Number of history entries (voters who voted), optionally for one election.
    pub async fn count(&self, election_id: Option<&str>) -> AppResult<u64> {
        let mut query = VotingHistory::find();
        if let Some(election_id) = election_id {
            query = query.filter(voting_history::Column::ElectionId.eq(election_id));
        }
        query.count(self.db.as_ref()).await.map_err(db_err)
    }

    /// Persist one vote: the ballot store tally, the voter's history entry and
    /// the voter's `has_voted` flag, all in one transaction.
    ///
    /// The tally write is a compare-and-swap on `election.version` that also
    /// requires the election to still be `active`. If the row moved, nothing is
    /// written: a closed election gives `InvalidState`, anything else `Conflict`.
    pub async fn commit_vote(&self, commit: VoteCommit) -> AppResult<CommittedVote> {
        let committed = self
            .db
            .transaction::<_, _, AppError>(|txn| {
                Box::pin(async move {
                    let updated = Election::update_many()
                        .col_expr(election::Column::Votes, Expr::value(commit.votes))
                        .col_expr(
                            election::Column::VoterChoices,
                            Expr::value(commit.voter_choices),
                        )
                        .col_expr(
                            election::Column::Version,
                            Expr::col(election::Column::Version).add(1),
                        )
                        .col_expr(election::Column::UpdatedAt, Expr::value(commit.voted_at))
                        .filter(election::Column::Id.eq(commit.election_id.as_str()))
                        .filter(election::Column::Version.eq(commit.expected_version))
                        .filter(election::Column::Status.eq(ElectionStatus::Active))
                        .exec(txn)
                        .await
                        .map_err(db_err)?;
                    if updated.rows_affected == 0 {
                        return Err(lost_swap(txn, &commit.election_id).await);
                    }

                    let history = match find_entry(txn, &commit.voter_id, &commit.election_id)
                        .await?
                    {
                        Some(existing) => {
                            let mut active: voting_history::ActiveModel = existing.into();
                            active.candidate_id = Set(commit.candidate_id.clone());
                            active.voted_at = Set(commit.voted_at.into());
                            active.is_revote = Set(true);
                            active.blockchain_tx_hash = Set(None);
                            active.update(txn).await.map_err(db_err)?
                        }
                        None => voting_history::ActiveModel {
                            id: Set(commit.history_id.clone()),
                            voter_id: Set(commit.voter_id.clone()),
                            election_id: Set(commit.election_id.clone()),
                            candidate_id: Set(commit.candidate_id.clone()),
                            voted_at: Set(commit.voted_at.into()),
                            is_revote: Set(commit.is_revote),
                            blockchain_tx_hash: Set(None),
                        }
                        .insert(txn)
                        .await
                        .map_err(db_err)?,
                    };

                    let voter = Voter::find_by_id(commit.voter_id.as_str())
                        .one(txn)
                        .await
                        .map_err(db_err)?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("Voter not found: {}", commit.voter_id))
                        })?;
                    let mut has_voted = match voter.has_voted.clone() {
                        JsonValue::Object(map) => map,
                        _ => serde_json::Map::new(),
                    };
                    has_voted.insert(commit.election_id.clone(), JsonValue::Bool(true));
                    let mut active: voter::ActiveModel = voter.into();
                    active.has_voted = Set(JsonValue::Object(has_voted));
                    active.updated_at = Set(Some(commit.voted_at.into()));
                    let voter = active.update(txn).await.map_err(db_err)?;
                    let voting_history = history_of(txn, &commit.voter_id).await?;

                    Ok(CommittedVote {
                        history,
                        voting_history,
                        voter,
                        election_version: commit.expected_version + 1,
                    })
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        debug!(
            election_id = %committed.history.election_id,
            voter_id = %committed.history.voter_id,
            version = committed.election_version,
            "Vote committed"
        );
        Ok(committed)
    }
}

/// Why a vote's compare-and-swap matched no row.
async fn lost_swap<C: ConnectionTrait>(conn: &C, election_id: &str) -> AppError {
    match Election::find_by_id(election_id).one(conn).await {
        Ok(Some(current)) if current.status != ElectionStatus::Active => AppError::InvalidState(
            format!(
                "Election is not accepting votes (status: {})",
                current.status.as_str()
            ),
        ),
        Ok(Some(_)) => {
            AppError::Conflict(format!("Election {election_id} was modified concurrently"))
        }
        Ok(None) => AppError::NotFound(format!("Election not found: {election_id}")),
        Err(e) => db_err(e),
    }
}

async fn history_of<C: ConnectionTrait>(
    conn: &C,
    voter_id: &str,
) -> AppResult<Vec<voting_history::Model>> {
    VotingHistory::find()
        .filter(voting_history::Column::VoterId.eq(voter_id))
        .order_by_desc(voting_history::Column::VotedAt)
        .all(conn)
        .await
        .map_err(db_err)
}

async fn find_entry<C: ConnectionTrait>(
    conn: &C,
    voter_id: &str,
    election_id: &str,
) -> AppResult<Option<voting_history::Model>> {
    VotingHistory::find()
        .filter(voting_history::Column::VoterId.eq(voter_id))
        .filter(voting_history::Column::ElectionId.eq(election_id))
        .one(conn)
        .await
        .map_err(db_err)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn create_test_voter(has_voted: JsonValue) -> voter::Model {
        voter::Model {
            id: "v1".to_string(),
            aadhaar_id: "123456789012".to_string(),
            aadhaar_hash: "h".to_string(),
            name: "Meera".to_string(),
            email: None,
            phone: None,
            otp_hash: None,
            otp_expires_at: None,
            otp_attempts: 0,
            locked_until: None,
            otp_verified: true,
            fingerprint_hash: None,
            biometric_verified: true,
            is_verified: true,
            has_voted,
            schema_version: voter::SCHEMA_VERSION,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_entry(candidate_id: &str, is_revote: bool) -> voting_history::Model {
        voting_history::Model {
            id: "h1".to_string(),
            voter_id: "v1".to_string(),
            election_id: "e1".to_string(),
            candidate_id: candidate_id.to_string(),
            voted_at: Utc::now().into(),
            is_revote,
            blockchain_tx_hash: None,
        }
    }

    fn commit(candidate_id: &str, is_revote: bool) -> VoteCommit {
        VoteCommit {
            election_id: "e1".to_string(),
            expected_version: 4,
            votes: json!({"a": 0, "b": 1}),
            voter_choices: json!({"v1": candidate_id}),
            voter_id: "v1".to_string(),
            candidate_id: candidate_id.to_string(),
            history_id: "h1".to_string(),
            is_revote,
            voted_at: Utc::now(),
        }
    }

    fn one_row() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn create_test_election(status: ElectionStatus) -> election::Model {
        election::Model {
            id: "e1".to_string(),
            title: "Ward 7".to_string(),
            description: String::new(),
            start_date: Utc::now().into(),
            end_date: Utc::now().into(),
            status,
            votes: json!({"a": 0, "b": 0}),
            voter_choices: json!({}),
            results_released: false,
            results_released_at: None,
            result_release_message: None,
            result_release_type: None,
            version: 5,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn into_log(db: Arc<DatabaseConnection>) -> Vec<sea_orm::Transaction> {
        let Ok(conn) = Arc::try_unwrap(db) else {
            panic!("connection still shared");
        };
        conn.into_transaction_log()
    }

    #[tokio::test]
    async fn test_commit_first_vote() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([one_row()])
                .append_query_results([Vec::<voting_history::Model>::new()])
                .append_query_results([[create_test_entry("b", false)]])
                .append_query_results([[create_test_voter(json!({}))]])
                .append_query_results([[create_test_voter(json!({"e1": true}))]])
                .append_query_results([[create_test_entry("b", false)]])
                .into_connection(),
        );

        let repo = VotingRepository::new(db.clone());
        let committed = repo.commit_vote(commit("b", false)).await.unwrap();

        assert_eq!(committed.history.candidate_id, "b");
        assert!(!committed.history.is_revote);
        assert!(committed.voter.has_voted_in("e1"));
        assert_eq!(committed.election_version, 5);
        assert_eq!(committed.voting_history.len(), 1);

        drop(repo);
        let log = into_log(db);
        assert_eq!(log.len(), 1, "all writes share one transaction");
        let cas: String = log[0].statements()[1].sql.split_whitespace().collect();
        assert!(cas.contains(r#""election"."status"="#), "{cas}");
    }

    #[tokio::test]
    async fn test_commit_revote_replaces_entry() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([one_row()])
                .append_query_results([[create_test_entry("a", false)]])
                .append_query_results([[create_test_entry("b", true)]])
                .append_query_results([[create_test_voter(json!({"e1": true}))]])
                .append_query_results([[create_test_voter(json!({"e1": true}))]])
                .append_query_results([[create_test_entry("b", true)]])
                .into_connection(),
        );

        let repo = VotingRepository::new(db);
        let committed = repo.commit_vote(commit("b", true)).await.unwrap();

        assert_eq!(committed.history.id, "h1");
        assert_eq!(committed.history.candidate_id, "b");
        assert!(committed.history.is_revote);
        assert_eq!(committed.voting_history[0].candidate_id, "b");
    }

    #[tokio::test]
    async fn test_commit_version_conflict_writes_nothing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .append_query_results([[create_test_election(ElectionStatus::Active)]])
                .into_connection(),
        );

        let repo = VotingRepository::new(db);
        let result = repo.commit_vote(commit("b", false)).await;

        match result {
            Err(err @ AppError::Conflict(_)) => assert!(err.is_retryable()),
            other => panic!("Expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_commit_against_closed_election_writes_nothing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .append_query_results([[create_test_election(ElectionStatus::Closed)]])
                .into_connection(),
        );

        let repo = VotingRepository::new(db.clone());
        let result = repo.commit_vote(commit("b", false)).await;

        match result {
            Err(AppError::InvalidState(msg)) => assert!(msg.contains("closed")),
            other => panic!("Expected InvalidState, got {other:?}"),
        }

        drop(repo);
        let log = into_log(db);
        let statements = log[0].statements();
        assert_eq!(statements.last().map(|s| s.sql.as_str()), Some("ROLLBACK"));
        assert!(
            statements
                .iter()
                .all(|s| !s.sql.contains("voting_history") && !s.sql.contains(r#""voter""#)),
            "no ledger writes"
        );
    }

    #[tokio::test]
    async fn test_commit_missing_voter_rolls_back() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([one_row()])
                .append_query_results([Vec::<voting_history::Model>::new()])
                .append_query_results([[create_test_entry("b", false)]])
                .append_query_results([Vec::<voter::Model>::new()])
                .into_connection(),
        );

        let repo = VotingRepository::new(db);
        let result = repo.commit_vote(commit("b", false)).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_as_database_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_errors([sea_orm::DbErr::Custom("disk full".to_string())])
                .into_connection(),
        );

        let repo = VotingRepository::new(db);
        let result = repo.commit_vote(commit("b", false)).await;

        match result {
            Err(AppError::Database(msg)) => assert!(msg.contains("disk full")),
            other => panic!("Expected Database error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_blockchain_tx_hash_skips_stale_candidate() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = VotingRepository::new(db.clone());
        let attached = repo
            .set_blockchain_tx_hash("v1", "e1", "a", Utc::now().into(), "0xabc")
            .await
            .unwrap();
        assert!(!attached);

        // an older vote for the same candidate must not match the newer entry
        drop(repo);
        let log = into_log(db);
        let update: String = log[0].statements()[0].sql.split_whitespace().collect();
        assert!(update.contains(r#""voting_history"."voted_at"="#), "{update}");
    }
}
