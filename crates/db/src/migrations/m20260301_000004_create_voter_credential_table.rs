//! Create `voter_credential` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VoterCredential::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VoterCredential::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VoterCredential::VoterId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VoterCredential::CredentialId)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(VoterCredential::PublicKey).text().not_null())
                    .col(
                        ColumnDef::new(VoterCredential::Counter)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(VoterCredential::LastUsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(VoterCredential::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_voter_credential_voter")
                            .from(VoterCredential::Table, VoterCredential::VoterId)
                            .to(Voter::Table, Voter::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_voter_credential_voter_id")
                    .table(VoterCredential::Table)
                    .col(VoterCredential::VoterId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VoterCredential::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum VoterCredential {
    Table,
    Id,
    VoterId,
    CredentialId,
    PublicKey,
    Counter,
    LastUsedAt,
    CreatedAt,
}

#[derive(Iden)]
enum Voter {
    Table,
    Id,
}
