pub mod database;
pub mod storage;

pub use database::{connect_and_migrate, SeaOrmRepositoryProvider};
pub use storage::InMemoryProvider;
