pub mod error;
pub mod postgres_store;
pub mod sqlite_store;

pub use error::{Result, StoreError};
pub use postgres_store::PgStore;
pub use sqlx::postgres::PgConnectOptions;
pub use sqlite_store::SqliteStore;
