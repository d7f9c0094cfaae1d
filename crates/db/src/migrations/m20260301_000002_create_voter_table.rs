//! Create `voter` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Voter::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Voter::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Voter::AadhaarId)
                            .string_len(12)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Voter::AadhaarHash)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Voter::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Voter::Email).string_len(256))
                    .col(ColumnDef::new(Voter::Phone).string_len(32))
                    .col(ColumnDef::new(Voter::OtpHash).string_len(64))
                    .col(ColumnDef::new(Voter::OtpExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Voter::OtpAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Voter::LockedUntil).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Voter::OtpVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Voter::FingerprintHash).string_len(64))
                    .col(
                        ColumnDef::new(Voter::BiometricVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Voter::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Voter::HasVoted)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Voter::SchemaVersion)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Voter::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Voter::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Voter::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Voter {
    Table,
    Id,
    AadhaarId,
    AadhaarHash,
    Name,
    Email,
    Phone,
    OtpHash,
    OtpExpiresAt,
    OtpAttempts,
    LockedUntil,
    OtpVerified,
    FingerprintHash,
    BiometricVerified,
    IsVerified,
    HasVoted,
    SchemaVersion,
    CreatedAt,
    UpdatedAt,
}
