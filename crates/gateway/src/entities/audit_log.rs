//! `audit_log` table: an append-only, hash-chained ledger.
//!
//! Unlike `invocations`, rows here are never updated after insertion —
//! `audit::AuditStore::append` is the only write path, and
//! `audit::verify_chain` recomputes every hash rather than trusting a
//! stored flag.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(unique)]
    pub id: Uuid,
    pub timestamp: DateTimeUtc,
    #[sea_orm(nullable)]
    pub user_token: Option<String>,
    #[sea_orm(nullable)]
    pub thread_id: Option<Uuid>,
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub status_code: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub payload: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_msg: Option<String>,
    pub prev_hash: String,
    pub entry_hash: String,
    /// Insertion-order tiebreaker; `(timestamp, id)` is the logical
    /// ordering key but ties on `timestamp` are common at this
    /// resolution, so the chain walk orders by this instead.
    #[sea_orm(primary_key)]
    pub sequence: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
