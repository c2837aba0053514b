use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use super::schema::SCHEMA;

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// Every pooled connection enforces foreign keys so deletes cascade.
    /// An in-memory database is private to its connection, so its pool holds
    /// exactly one.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let is_memory = Self::is_memory_path(&path);
        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path)
        }
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

        let builder = Pool::builder();
        let builder = if is_memory { builder.max_size(1) } else { builder };
        let pool = builder
            .build(manager)
            .context("Failed to create database connection pool")?;

        Ok(Self { pool })
    }

    fn is_memory_path<P: AsRef<Path>>(path: P) -> bool {
        let path_str = path.as_ref().to_string_lossy();
        path_str.trim().eq_ignore_ascii_case(MEMORY_DB_PATH)
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Initialize the database schema
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let conn = db.connection().expect("Failed to get connection");
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .expect("Failed to prepare statement");

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .expect("Failed to query tables")
            .collect::<Result<Vec<_>, _>>()
            .expect("Failed to collect tables");

        for table in [
            "users",
            "posts",
            "post_images",
            "post_likes",
            "comments",
            "comment_likes",
            "follows",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("first initialize");
        db.initialize().expect("second initialize");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = Database::in_memory().expect("Failed to create database");
        let conn = db.connection().expect("Failed to get connection");
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .expect("Failed to read pragma");
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_memory_database_detection() {
        for path in [":memory:", " :memory: ", ":MEMORY:"] {
            assert!(Database::is_memory_path(path));
        }
        assert!(!Database::is_memory_path("/tmp/connectsphere.db"));

        let dir = tempfile::tempdir().expect("tempdir");
        let file_path = dir.path().join("test.db");
        let db = Database::new(&file_path).expect("Failed to create file database");
        db.initialize().expect("Failed to initialize file schema");
        assert!(file_path.exists());
    }
}
