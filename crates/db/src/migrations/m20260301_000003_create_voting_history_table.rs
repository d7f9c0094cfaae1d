//! Create `voting_history` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VotingHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VotingHistory::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VotingHistory::VoterId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VotingHistory::ElectionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VotingHistory::CandidateId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VotingHistory::VotedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(VotingHistory::IsRevote)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(VotingHistory::BlockchainTxHash).string_len(66))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_voting_history_voter")
                            .from(VotingHistory::Table, VotingHistory::VoterId)
                            .to(Voter::Table, Voter::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_voting_history_election")
                            .from(VotingHistory::Table, VotingHistory::ElectionId)
                            .to(Election::Table, Election::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique: one entry per voter per election
        manager
            .create_index(
                Index::create()
                    .name("idx_voting_history_voter_election")
                    .table(VotingHistory::Table)
                    .col(VotingHistory::VoterId)
                    .col(VotingHistory::ElectionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: election_id (cascade deletes, admin stats)
        manager
            .create_index(
                Index::create()
                    .name("idx_voting_history_election_id")
                    .table(VotingHistory::Table)
                    .col(VotingHistory::ElectionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VotingHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum VotingHistory {
    Table,
    Id,
    VoterId,
    ElectionId,
    CandidateId,
    VotedAt,
    IsRevote,
    BlockchainTxHash,
}

#[derive(Iden)]
enum Voter {
    Table,
    Id,
}

#[derive(Iden)]
enum Election {
    Table,
    Id,
}
