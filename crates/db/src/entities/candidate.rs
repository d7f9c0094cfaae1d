//! Candidate entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A candidate on an election's ballot.
///
/// `id` is assigned once when the election is created and is the only key
/// the tally and the voting history ever use.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "candidate")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub election_id: String,

    /// Zero-based ballot order; results break ties by it.
    pub position: i32,

    pub name: String,

    pub party: String,

    #[sea_orm(nullable)]
    pub photo: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::election::Entity",
        from = "Column::ElectionId",
        to = "super::election::Column::Id",
        on_delete = "Cascade"
    )]
    Election,
}

impl Related<super::election::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Election.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
