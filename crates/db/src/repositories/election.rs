//! Election repository (the ballot store).

use std::sync::Arc;

use crate::entities::{Candidate, Election, candidate, election, election::ElectionStatus};
use evote_common::{AppError, AppResult};
use super::{db_err, flatten_txn_error};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

/// Election repository for database operations.
#[derive(Clone)]
pub struct ElectionRepository {
    db: Arc<DatabaseConnection>,
}

fn candidate_active(model: candidate::Model) -> candidate::ActiveModel {
    candidate::ActiveModel {
        id: Set(model.id),
        election_id: Set(model.election_id),
        position: Set(model.position),
        name: Set(model.name),
        party: Set(model.party),
        photo: Set(model.photo),
        bio: Set(model.bio),
    }
}

impl ElectionRepository {
    /// Create a new election repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an election by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<election::Model>> {
        Election::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get an election by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<election::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Election not found: {id}")))
    }

    /// List elections, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<ElectionStatus>) -> AppResult<Vec<election::Model>> {
        let mut query = Election::find();
        if let Some(status) = status {
            query = query.filter(election::Column::Status.eq(status));
        }
        query
            .order_by_desc(election::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Candidates of an election in ballot order.
    pub async fn find_candidates(&self, election_id: &str) -> AppResult<Vec<candidate::Model>> {
        Candidate::find()
            .filter(candidate::Column::ElectionId.eq(election_id))
            .order_by_asc(candidate::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert an election together with its candidates in one transaction.
    pub async fn create_with_candidates(
        &self,
        model: election::ActiveModel,
        candidates: Vec<candidate::Model>,
    ) -> AppResult<(election::Model, Vec<candidate::Model>)> {
        self.db
            .transaction::<_, _, AppError>(|txn| {
                Box::pin(async move {
                    let election = model.insert(txn).await.map_err(db_err)?;
                    if !candidates.is_empty() {
                        Candidate::insert_many(candidates.iter().cloned().map(candidate_active))
                            .exec_without_returning(txn)
                            .await
                            .map_err(db_err)?;
                    }
                    Ok((election, candidates))
                })
            })
            .await
            .map_err(flatten_txn_error)
    }

    /// Write an election's changed columns if the row is still at
    /// `expected_version`, bumping the version.
    ///
    /// Votes compare-and-swap on the same column, so a vote computed before an
    /// admin change loses. Returns `Conflict` if the row moved.
    pub async fn update(
        &self,
        model: election::ActiveModel,
        expected_version: i32,
    ) -> AppResult<election::Model> {
        versioned_update(self.db.as_ref(), model, expected_version).await
    }

    /// [`update`](Self::update) plus a replacement ballot, in one transaction.
    ///
    /// The caller resets the tally columns on `model` to match `candidates`.
    pub async fn update_with_candidates(
        &self,
        model: election::ActiveModel,
        expected_version: i32,
        candidates: Vec<candidate::Model>,
    ) -> AppResult<(election::Model, Vec<candidate::Model>)> {
        self.db
            .transaction::<_, _, AppError>(|txn| {
                Box::pin(async move {
                    let election = versioned_update(txn, model, expected_version).await?;

                    Candidate::delete_many()
                        .filter(candidate::Column::ElectionId.eq(election.id.as_str()))
                        .exec(txn)
                        .await
                        .map_err(db_err)?;
                    if !candidates.is_empty() {
                        Candidate::insert_many(candidates.iter().cloned().map(candidate_active))
                            .exec_without_returning(txn)
                            .await
                            .map_err(db_err)?;
                    }
                    Ok((election, candidates))
                })
            })
            .await
            .map_err(flatten_txn_error)
    }

    /// Delete an election. Candidates and history entries cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Election::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Election not found: {id}")));
        }
        Ok(())
    }

    /// Count elections, optionally by status.
    pub async fn count(&self, status: Option<ElectionStatus>) -> AppResult<u64> {
        let mut query = Election::find();
        if let Some(status) = status {
            query = query.filter(election::Column::Status.eq(status));
        }
        query.count(self.db.as_ref()).await.map_err(db_err)
    }
}

async fn versioned_update<C: ConnectionTrait>(
    conn: &C,
    mut model: election::ActiveModel,
    expected_version: i32,
) -> AppResult<election::Model> {
    model.version = Set(expected_version + 1);
    Election::update(model)
        .filter(election::Column::Version.eq(expected_version))
        .exec(conn)
        .await
        .map_err(|e| match e {
            DbErr::RecordNotUpdated => {
                AppError::Conflict("Election was modified concurrently".to_string())
            }
            other => db_err(other),
        })
}
