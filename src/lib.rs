//! Database core for the outfit platform.
//!
//! Stores users, sessions, clothing items, categories, outfits and the outfit calendar in
//! either an embedded SQLite file or a MySQL/MariaDB server, chosen at startup.
//!
//! # Core Types
//!
//! - **[`ConnectionManager`]**: owns the shared [`Database`] and opens it on first use
//! - **[`Database`]**: an open adapter whose schema has been initialized
//! - **[`DbSettings`]**: backend selection, read from `DATABASE_TYPE`, `DATABASE_PATH` and
//!   `DATABASE_URL`
//! - **[`SchemaReport`]**: what each migration step did when the database was opened
//!
//! Querying goes through [`outfit_toolkit::Executor`], implemented by [`Database`] (via
//! `Deref` to [`Adapter`]) and by the [`outfit_toolkit::Transaction`] handed to transaction
//! closures. The helpers in [`outfit_toolkit::helpers`] return mutated rows on both backends.
//!
//! # Usage
//!
//! ```no_run
//! use outfit_db::ConnectionManager;
//! use outfit_toolkit::helpers::insert_and_get;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), outfit_db::Error> {
//! let manager = ConnectionManager::from_env()?;
//! let db = manager.get_db().await?;
//!
//! let user = insert_and_get(
//!    &*db,
//!    "users",
//!    &["email", "password_hash"],
//!    vec![json!("alice@example.com"), json!("<hash>")],
//! )
//! .await?;
//!
//! manager.close_db().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod manager;
pub mod migrations;
pub mod report;
pub mod schema;

pub use config::{BackendKind, DbSettings};
pub use error::{Error, Result};
pub use manager::{ConnectionManager, Database};
pub use report::{MigrationEvent, MigrationStatus, MigrationStep, SchemaReport};
pub use schema::{initialize_schema, list_tables};

pub use outfit_toolkit::{Adapter, Dialect};
