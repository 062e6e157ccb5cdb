//! Backend-neutral database toolkit for the outfit platform.
//!
//! This crate sits between the low-level connection manager (`outfit-conn-mgr`)
//! and application-level code. It provides:
//!
//! - [`Executor`]: the query capability set (`query`, `exec`, `prepare`) shared by adapters
//!   and open transactions
//! - [`SqliteAdapter`], [`MySqlAdapter`] and the [`Adapter`] enum over both
//! - Closure-scoped [`Transaction`]s that commit on `Ok` and roll back on `Err`
//! - [`helpers`] that return the inserted, updated or deleted row on both backends
//! - JSON value binding and row decoding normalized across backends
//!
//! # Example
//!
//! ```no_run
//! use outfit_toolkit::{Adapter, Executor, SqliteAdapter};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), outfit_toolkit::Error> {
//! let db: Adapter = SqliteAdapter::connect("wardrobe.db", None).await?.into();
//!
//! // Write
//! db.exec("INSERT INTO users (email, password_hash) VALUES (?, ?)", vec![
//!    json!("alice@example.com"),
//!    json!("hash"),
//! ])
//! .await?;
//!
//! // Read
//! let rows = db.query("SELECT * FROM users", vec![]).await?;
//!
//! // Transaction
//! db.transaction(|tx| {
//!    Box::pin(async move {
//!       tx.exec("DELETE FROM sessions", vec![]).await?;
//!       tx.exec("DELETE FROM users", vec![]).await?;
//!       Ok(())
//!    })
//! })
//! .await?;
//!
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod bind;
pub mod decode;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod helpers;
pub mod transactions;
pub mod wrapper;

pub use bind::{BindValue, bind_mysql, bind_sqlite};
pub use decode::JsonRow;
pub use dialect::Dialect;
pub use error::{ConstraintKind, Error, Result};
pub use executor::{Executor, Statement, WriteQueryResult, is_read_only};
pub use transactions::{ForeignKeys, Transaction};
pub use wrapper::{Adapter, MySqlAdapter, SqliteAdapter};

// Re-export commonly used types from dependencies
pub use outfit_conn_mgr::{
   MySqlDatabase, MySqlPoolConfig, MySqlUrl, SqliteDatabase, SqliteDatabaseConfig,
};
