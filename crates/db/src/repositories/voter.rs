//! Voter repository.

use std::sync::Arc;

use crate::entities::{Voter, voter};
use super::db_err;
use evote_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Voter repository for database operations.
#[derive(Clone)]
pub struct VoterRepository {
    db: Arc<DatabaseConnection>,
}

impl VoterRepository {
    /// Create a new voter repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a voter by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<voter::Model>> {
        Voter::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a voter by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<voter::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Voter not found: {id}")))
    }

    /// Find a voter by Aadhaar number.
    pub async fn find_by_aadhaar_id(&self, aadhaar_id: &str) -> AppResult<Option<voter::Model>> {
        Voter::find()
            .filter(voter::Column::AadhaarId.eq(aadhaar_id))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a voter by Aadhaar number, returning error if not found.
    pub async fn get_by_aadhaar_id(&self, aadhaar_id: &str) -> AppResult<voter::Model> {
        self.find_by_aadhaar_id(aadhaar_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Voter not found for Aadhaar number".to_string()))
    }

    /// Create a voter.
    pub async fn create(&self, model: voter::ActiveModel) -> AppResult<voter::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Update a voter.
    pub async fn update(&self, model: voter::ActiveModel) -> AppResult<voter::Model> {
        model.update(self.db.as_ref()).await.map_err(db_err)
    }

    /// Delete a voter. History entries and passkeys cascade; tallies are untouched.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Voter::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Voter not found: {id}")));
        }
        Ok(())
    }

    /// List voters, newest first.
    pub async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<voter::Model>> {
        Voter::find()
            .order_by_desc(voter::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Count all voters.
    pub async fn count(&self) -> AppResult<u64> {
        Voter::find().count(self.db.as_ref()).await.map_err(db_err)
    }

    /// Count fully verified voters.
    pub async fn count_verified(&self) -> AppResult<u64> {
        Voter::find()
            .filter(voter::Column::IsVerified.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
