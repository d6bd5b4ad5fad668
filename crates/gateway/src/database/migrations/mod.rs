//! SeaORM migrations for multi-database support.
//!
//! Database-agnostic migrations that work across SQLite, PostgreSQL and
//! MySQL without per-backend branches where the `sea_orm_migration`
//! schema builder already abstracts over them.

use sea_orm_migration::prelude::*;

/// Derive a migration's name from its containing folder when the
/// migration is implemented as `folder_name/mod.rs`.
///
/// This avoids the `DeriveMigrationName` pitfall that yields the
/// non-unique "mod" for every folder-based migration. The folder name
/// must follow the convention: mYYYYMMDD_HHMMSS_description
///
/// Usage inside a folder-based migration's `mod.rs`:
/// ```ignore
/// pub struct Migration;
/// folder_migration_name!();
/// ```
#[macro_export]
macro_rules! folder_migration_name {
    () => {
        impl sea_orm_migration::MigrationName for Migration {
            fn name(&self) -> &str {
                static NAME: ::std::sync::OnceLock<String> = ::std::sync::OnceLock::new();
                NAME.get_or_init(|| {
                    let f = file!();
                    let trimmed = f
                        .trim_end_matches("mod.rs")
                        .trim_end_matches(|c| c == '/' || c == '\\');
                    trimmed
                        .rsplit(|c| c == '/' || c == '\\')
                        .next()
                        .unwrap()
                        .to_string()
                })
            }
        }
    };
}

pub mod m20260101_000001_initial_schema;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260101_000001_initial_schema::Migration)]
    }
}
