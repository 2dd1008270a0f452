//! Load stage: SQLite upsert and Parquet snapshot.

pub mod snapshot;
pub mod sqlite;

pub use snapshot::write_parquet;
pub use sqlite::load_sqlite;
