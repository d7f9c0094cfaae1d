//! Voter entity (the voter ledger).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Current layout of the voter row. Older rows are rewritten by migration.
pub const SCHEMA_VERSION: i32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "voter")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// 12-digit Aadhaar number
    #[sea_orm(unique)]
    pub aadhaar_id: String,

    #[sea_orm(unique)]
    pub aadhaar_hash: String,

    pub name: String,

    #[sea_orm(nullable)]
    pub email: Option<String>,

    #[sea_orm(nullable)]
    pub phone: Option<String>,

    #[serde(skip_serializing)]
    #[sea_orm(nullable)]
    pub otp_hash: Option<String>,

    #[sea_orm(nullable)]
    pub otp_expires_at: Option<DateTimeWithTimeZone>,

    pub otp_attempts: i32,

    #[sea_orm(nullable)]
    pub locked_until: Option<DateTimeWithTimeZone>,

    pub otp_verified: bool,

    #[serde(skip_serializing)]
    #[sea_orm(nullable)]
    pub fingerprint_hash: Option<String>,

    pub biometric_verified: bool,

    pub is_verified: bool,

    /// Election id → has voted (JSON object of booleans)
    #[sea_orm(column_type = "JsonBinary")]
    pub has_voted: Json,

    pub schema_version: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Decoded `has_voted` map. Malformed entries are skipped.
    #[must_use]
    pub fn has_voted_map(&self) -> BTreeMap<String, bool> {
        self.has_voted
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the quick-lookup map says this voter voted in `election_id`.
    #[must_use]
    pub fn has_voted_in(&self, election_id: &str) -> bool {
        self.has_voted
            .get(election_id)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Whether OTP requests are refused at `now`.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::voting_history::Entity")]
    VotingHistory,

    #[sea_orm(has_many = "super::voter_credential::Entity")]
    VoterCredential,
}

impl Related<super::voting_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingHistory.def()
    }
}

impl Related<super::voter_credential::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VoterCredential.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
