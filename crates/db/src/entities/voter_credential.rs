//! Voter passkey (`WebAuthn`) entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "voter_credential")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub voter_id: String,

    /// `WebAuthn` credential ID (base64url encoded).
    #[sea_orm(column_type = "Text", unique)]
    pub credential_id: String,

    /// Serialized `webauthn_rs::prelude::Passkey`.
    #[sea_orm(column_type = "Text")]
    pub public_key: String,

    /// Signature counter for replay protection.
    pub counter: i64,

    #[sea_orm(nullable)]
    pub last_used_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::voter::Entity",
        from = "Column::VoterId",
        to = "super::voter::Column::Id",
        on_delete = "Cascade"
    )]
    Voter,
}

impl Related<super::voter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Voter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
