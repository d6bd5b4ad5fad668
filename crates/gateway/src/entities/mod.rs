//! SeaORM entity definitions backing the durable job store and audit log.

pub mod audit_log;
pub mod invocation;

pub mod prelude {
    pub use super::audit_log::Entity as AuditLog;
    pub use super::invocation::Entity as Invocation;
}
