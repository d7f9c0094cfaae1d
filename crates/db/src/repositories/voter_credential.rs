//! Voter passkey repository.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

use super::db_err;
use crate::entities::{VoterCredential, voter_credential};
use evote_common::AppResult;

/// Passkey repository for database operations.
#[derive(Clone)]
pub struct VoterCredentialRepository {
    db: Arc<DatabaseConnection>,
}

impl VoterCredentialRepository {
    /// Create a new credential repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All passkeys of a voter, oldest first.
    pub async fn find_by_voter_id(
        &self,
        voter_id: &str,
    ) -> AppResult<Vec<voter_credential::Model>> {
        VoterCredential::find()
            .filter(voter_credential::Column::VoterId.eq(voter_id))
            .order_by_asc(voter_credential::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a passkey by its `WebAuthn` credential ID.
    pub async fn find_by_credential_id(
        &self,
        credential_id: &str,
    ) -> AppResult<Option<voter_credential::Model>> {
        VoterCredential::find()
            .filter(voter_credential::Column::CredentialId.eq(credential_id))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Store a new passkey.
    pub async fn create(
        &self,
        model: voter_credential::ActiveModel,
    ) -> AppResult<voter_credential::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Record a successful authentication.
    pub async fn update_counter(&self, id: &str, counter: i64) -> AppResult<()> {
        VoterCredential::update_many()
            .col_expr(voter_credential::Column::Counter, Expr::value(counter))
            .col_expr(
                voter_credential::Column::LastUsedAt,
                Expr::value(Utc::now()),
            )
            .filter(voter_credential::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
