//! Creates `invocations` and `audit_log`.
//!
//! Unlike the original implementation's first migration, `audit_log`
//! carries `prev_hash`/`entry_hash` columns from the start rather than
//! being bolted on later — the chain has no ungrounded first link.

use sea_orm_migration::prelude::*;

use crate::folder_migration_name;

#[derive(DeriveIden)]
enum Invocation {
    Table,
    Id,
    Agent,
    UserToken,
    Status,
    CreatedAt,
    StartedAt,
    EndedAt,
    Payload,
    Result,
    Error,
    Progress,
    Synchronous,
}

#[derive(DeriveIden)]
enum AuditLog {
    Table,
    Sequence,
    Id,
    Timestamp,
    UserToken,
    ThreadId,
    Actor,
    Action,
    Resource,
    StatusCode,
    Payload,
    ErrorMsg,
    PrevHash,
    EntryHash,
}

pub struct Migration;
folder_migration_name!();

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invocation::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invocation::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Invocation::Agent).string().not_null())
                    .col(ColumnDef::new(Invocation::UserToken).string().not_null())
                    .col(ColumnDef::new(Invocation::Status).string().not_null())
                    .col(ColumnDef::new(Invocation::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Invocation::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Invocation::EndedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Invocation::Payload).text().not_null())
                    .col(ColumnDef::new(Invocation::Result).text())
                    .col(ColumnDef::new(Invocation::Error).text())
                    .col(ColumnDef::new(Invocation::Progress).text())
                    .col(ColumnDef::new(Invocation::Synchronous).boolean().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invocations_agent")
                    .table(Invocation::Table)
                    .col(Invocation::Agent)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuditLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLog::Sequence)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLog::Id).uuid().not_null().unique_key())
                    .col(ColumnDef::new(AuditLog::Timestamp).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(AuditLog::UserToken).string())
                    .col(ColumnDef::new(AuditLog::ThreadId).uuid())
                    .col(ColumnDef::new(AuditLog::Actor).string().not_null())
                    .col(ColumnDef::new(AuditLog::Action).string().not_null())
                    .col(ColumnDef::new(AuditLog::Resource).string().not_null())
                    .col(ColumnDef::new(AuditLog::StatusCode).integer().not_null())
                    .col(ColumnDef::new(AuditLog::Payload).text())
                    .col(ColumnDef::new(AuditLog::ErrorMsg).text())
                    .col(ColumnDef::new(AuditLog::PrevHash).string().not_null())
                    .col(ColumnDef::new(AuditLog::EntryHash).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_log_thread_id")
                    .table(AuditLog::Table)
                    .col(AuditLog::ThreadId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invocation::Table).to_owned())
            .await?;
        Ok(())
    }
}
