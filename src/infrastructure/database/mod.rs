//! SeaORM persistence
//!
//! Entities, migrations and repository implementations for the SQLite
//! backing store (any SeaORM-supported database works; the connection
//! URL comes from the `database` config section).

pub mod entities;
pub mod migrator;
pub mod repositories;

pub use repositories::SeaOrmRepositoryProvider;

use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use migrator::Migrator;

/// Open the database and bring the schema up to date.
pub async fn connect_and_migrate(url: &str) -> Result<DatabaseConnection, DbErr> {
    info!(url, "Connecting to database");
    let db = Database::connect(url).await?;
    Migrator::up(&db, None).await?;
    info!("Database schema up to date");
    Ok(db)
}
