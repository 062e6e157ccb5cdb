//! # outfit-conn-mgr
//!
//! Connection policies for the two storage backends of the outfit database core.
//!
//! ## Core Types
//!
//! - **[`SqliteDatabase`]**: Embedded single-file database with separate read and write pools
//! - **[`MySqlDatabase`]**: Networked MySQL/MariaDB database behind a bounded pool
//! - **[`MySqlUrl`]**: Connection URL parsed into its parts without a URL library
//! - **[`SqliteDatabaseConfig`]** / **[`MySqlPoolConfig`]**: Pool settings
//! - **[`WriteGuard`]**: RAII guard ensuring exclusive write access to SQLite
//! - **[`Error`]**: Error type for connection operations
//!
//! ## Architecture
//!
//! - **SQLite**: read-only pool for concurrent reads, write pool with a max of 1 connection.
//!   WAL mode and foreign-key enforcement are switched on while connecting.
//! - **MySQL**: one pool bounded to [`MySqlPoolConfig::max_connections`] connections. Callers
//!   waiting longer than [`MySqlPoolConfig::acquire_timeout_ms`] get
//!   `sqlx::Error::PoolTimedOut` instead of waiting forever.
//!
//! ## Usage
//!
//! ```no_run
//! use outfit_conn_mgr::SqliteDatabase;
//!
//! #[tokio::main]
//! async fn main() -> outfit_conn_mgr::Result<()> {
//!     let db = SqliteDatabase::connect("wardrobe.db", None).await?;
//!
//!     // Use read_pool() for read queries (concurrent reads)
//!     let rows = sqlx::query("SELECT * FROM users")
//!         .fetch_all(db.read_pool()?)
//!         .await?;
//!
//!     // Acquire the writer for write queries (exclusive)
//!     let mut writer = db.acquire_writer().await?;
//!     sqlx::query("INSERT INTO users (email, password_hash) VALUES (?, ?)")
//!         .bind("alice@example.com")
//!         .bind("hash")
//!         .execute(&mut *writer)
//!         .await?;
//!     drop(writer);
//!
//!     db.close().await?;
//!     Ok(())
//! }
//! ```
//!
mod config;
mod database;
mod error;
mod mysql;
mod url;
mod write_guard;

// Re-export public types
pub use config::{MySqlPoolConfig, SqliteDatabaseConfig};
pub use database::SqliteDatabase;
pub use error::Error;
pub use mysql::MySqlDatabase;
pub use url::{DEFAULT_MYSQL_PORT, MySqlUrl};
pub use write_guard::WriteGuard;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
