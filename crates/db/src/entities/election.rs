//! Election entity (the ballot store).

use std::collections::BTreeMap;
use std::str::FromStr;

use evote_common::{AppError, AppResult, Tally};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Election lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Created, not yet open for voting.
    #[sea_orm(string_value = "upcoming")]
    #[default]
    Upcoming,
    /// Accepting votes.
    #[sea_orm(string_value = "active")]
    Active,
    /// Voting finished; results may be released.
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl ElectionStatus {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Upcoming => 0,
            Self::Active => 1,
            Self::Closed => 2,
        }
    }

    /// Status only moves forward: upcoming → active → closed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        next.rank() > self.rank()
    }
}

impl FromStr for ElectionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            other => Err(AppError::Validation(format!(
                "Unknown election status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "election")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub start_date: DateTimeWithTimeZone,

    pub end_date: DateTimeWithTimeZone,

    #[sea_orm(indexed)]
    pub status: ElectionStatus,

    /// Vote counts keyed by candidate id (JSON object of integers)
    #[sea_orm(column_type = "JsonBinary")]
    pub votes: Json,

    /// Current candidate of every voter who has voted (JSON object)
    #[sea_orm(column_type = "JsonBinary")]
    pub voter_choices: Json,

    pub results_released: bool,

    #[sea_orm(nullable)]
    pub results_released_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub result_release_message: Option<String>,

    #[sea_orm(nullable)]
    pub result_release_type: Option<String>,

    /// Bumped on every tally write; guards concurrent read-modify-write.
    pub version: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Decode the persisted counters and choices.
    pub fn tally(&self) -> AppResult<Tally> {
        let votes: BTreeMap<String, u64> = serde_json::from_value(self.votes.clone())
            .map_err(|e| AppError::Internal(format!("Invalid election votes: {e}")))?;
        let choices: BTreeMap<String, String> = serde_json::from_value(self.voter_choices.clone())
            .map_err(|e| AppError::Internal(format!("Invalid election voter choices: {e}")))?;
        Ok(Tally::from_parts(votes, choices))
    }

    /// Whether voters may see results.
    #[must_use]
    pub fn results_visible(&self) -> bool {
        self.status == ElectionStatus::Closed && self.results_released
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::candidate::Entity")]
    Candidate,

    #[sea_orm(has_many = "super::voting_history::Entity")]
    VotingHistory,
}

impl Related<super::candidate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Candidate.def()
    }
}

impl Related<super::voting_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
