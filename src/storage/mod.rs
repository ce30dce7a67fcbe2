//! SQLite Record Store: pool, migrations, queries and the async seam

pub mod db;
pub mod migrations;
pub mod store;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use store::{RecordStore, SqliteStore};
