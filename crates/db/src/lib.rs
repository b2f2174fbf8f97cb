pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod warehouse;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{seed_lookups, SeedResult};
pub use repositories::{MessageStore, RepositoryError, SqlMessageStore};
pub use warehouse::{CatalogWarehouse, PgCatalogWarehouse, WarehouseCredentials, WarehouseError};
