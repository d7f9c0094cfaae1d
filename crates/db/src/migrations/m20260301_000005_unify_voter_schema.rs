//! Bring version-1 voter rows to the unified layout.
//!
//! Version 1 treated a passed OTP as full verification. Version 2 requires
//! both OTP and biometric checks.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backfill = Query::update()
            .table(Voter::Table)
            .value(
                Voter::IsVerified,
                Expr::col(Voter::OtpVerified).and(Expr::col(Voter::BiometricVerified)),
            )
            .value(Voter::SchemaVersion, 2)
            .and_where(Expr::col(Voter::SchemaVersion).lt(2))
            .to_owned();
        manager.exec_stmt(backfill).await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Voter::Table)
                    .modify_column(
                        ColumnDef::new(Voter::SchemaVersion)
                            .integer()
                            .not_null()
                            .default(2),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Voter::Table)
                    .modify_column(
                        ColumnDef::new(Voter::SchemaVersion)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum Voter {
    Table,
    IsVerified,
    OtpVerified,
    BiometricVerified,
    SchemaVersion,
}
