//! Create `election` and `candidate` tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Election::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Election::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Election::Title).string_len(200).not_null())
                    .col(
                        ColumnDef::new(Election::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Election::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Election::EndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Election::Status)
                            .string_len(16)
                            .not_null()
                            .default("upcoming"),
                    )
                    .col(
                        ColumnDef::new(Election::Votes)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Election::VoterChoices)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Election::ResultsReleased)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Election::ResultsReleasedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Election::ResultReleaseMessage).text())
                    .col(ColumnDef::new(Election::ResultReleaseType).string_len(32))
                    .col(
                        ColumnDef::new(Election::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Election::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Election::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index: status (list filter)
        manager
            .create_index(
                Index::create()
                    .name("idx_election_status")
                    .table(Election::Table)
                    .col(Election::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Candidate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Candidate::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Candidate::ElectionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Candidate::Position).integer().not_null())
                    .col(ColumnDef::new(Candidate::Name).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Candidate::Party)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Candidate::Photo).string_len(1024))
                    .col(ColumnDef::new(Candidate::Bio).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_candidate_election")
                            .from(Candidate::Table, Candidate::ElectionId)
                            .to(Election::Table, Election::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (election_id, position) for ballot order
        manager
            .create_index(
                Index::create()
                    .name("idx_candidate_election_position")
                    .table(Candidate::Table)
                    .col(Candidate::ElectionId)
                    .col(Candidate::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Candidate::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Election::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Election {
    Table,
    Id,
    Title,
    Description,
    StartDate,
    EndDate,
    Status,
    Votes,
    VoterChoices,
    ResultsReleased,
    ResultsReleasedAt,
    ResultReleaseMessage,
    ResultReleaseType,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Candidate {
    Table,
    Id,
    ElectionId,
    Position,
    Name,
    Party,
    Photo,
    Bio,
}
