//! Database context and the lazily-opened shared connection.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use outfit_toolkit::{Adapter, MySqlAdapter, SqliteAdapter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{BackendKind, DbSettings};
use crate::report::SchemaReport;
use crate::schema::initialize_schema;
use crate::Result;

/// An open database with its schema initialized.
///
/// Cloning is cheap; clones share the same pools. Derefs to [`Adapter`], so queries,
/// statements, transactions and the mutation helpers work on it directly.
#[derive(Clone, Debug)]
pub struct Database {
   adapter: Adapter,
   schema: Arc<SchemaReport>,
}

impl Database {
   /// Connect to the configured backend and initialize the schema.
   ///
   /// # Example
   ///
   /// ```no_run
   /// use outfit_db::{Database, DbSettings};
   /// use outfit_toolkit::Executor;
   ///
   /// # async fn example() -> Result<(), outfit_db::Error> {
   /// let db = Database::open(&DbSettings::sqlite("data/outfit-platform.db")).await?;
   /// let users = db.query("SELECT id, email FROM users", vec![]).await?;
   /// db.close().await?;
   /// # Ok(())
   /// # }
   /// ```
   pub async fn open(settings: &DbSettings) -> Result<Self> {
      let adapter: Adapter = match settings.backend {
         BackendKind::Sqlite => {
            debug!("Opening SQLite database at {}", settings.sqlite_path.display());
            SqliteAdapter::connect(&settings.sqlite_path, settings.sqlite_config.clone())
               .await?
               .into()
         }
         BackendKind::MySql => {
            let url = settings.require_database_url()?;
            debug!("Opening MySQL pool");
            MySqlAdapter::connect(url, None).await?.into()
         }
      };

      Self::with_adapter(adapter).await
   }

   /// Initialize the schema on an already-connected adapter.
   ///
   /// The adapter is closed if the base tables cannot be created.
   pub async fn with_adapter(adapter: Adapter) -> Result<Self> {
      match initialize_schema(&adapter).await {
         Ok(report) => Ok(Self {
            adapter,
            schema: Arc::new(report),
         }),
         Err(e) => {
            if let Err(close_err) = adapter.close().await {
               warn!("Failed to close database after schema error: {}", close_err);
            }
            Err(e)
         }
      }
   }

   pub fn adapter(&self) -> &Adapter {
      &self.adapter
   }

   /// Outcome of the migrations run when this database was opened.
   pub fn schema_report(&self) -> &SchemaReport {
      &self.schema
   }

   /// Close every pooled connection. Idempotent.
   pub async fn close(&self) -> Result<()> {
      self.adapter.close().await?;
      Ok(())
   }
}

impl Deref for Database {
   type Target = Adapter;

   fn deref(&self) -> &Adapter {
      &self.adapter
   }
}

/// Owns the application's one shared [`Database`].
///
/// The first [`ConnectionManager::get_db`] opens the database and initializes the schema;
/// later calls return the same instance. Concurrent first callers wait on one another, so
/// initialization happens once.
pub struct ConnectionManager {
   settings: DbSettings,
   state: Mutex<Option<Database>>,
   initialized: AtomicBool,
}

impl ConnectionManager {
   pub fn new(settings: DbSettings) -> Self {
      Self {
         settings,
         state: Mutex::new(None),
         initialized: AtomicBool::new(false),
      }
   }

   /// Manager configured from `DATABASE_TYPE`, `DATABASE_PATH` and `DATABASE_URL`.
   pub fn from_env() -> Result<Self> {
      Ok(Self::new(DbSettings::from_env()?))
   }

   pub fn settings(&self) -> &DbSettings {
      &self.settings
   }

   /// The shared database, opened on first use.
   pub async fn get_db(&self) -> Result<Database> {
      let mut state = self.state.lock().await;
      if let Some(db) = state.as_ref() {
         return Ok(db.clone());
      }

      let db = Database::open(&self.settings).await?;
      info!(
         "Database ready ({}), {} migration failure(s)",
         self.settings.backend.dialect(),
         db.schema_report().failures().count()
      );
      *state = Some(db.clone());
      self.initialized.store(true, Ordering::SeqCst);
      Ok(db)
   }

   /// Close the shared database. The next [`ConnectionManager::get_db`] opens a fresh one
   /// and initializes the schema again.
   pub async fn close_db(&self) -> Result<()> {
      let mut state = self.state.lock().await;
      let Some(db) = state.take() else {
         return Ok(());
      };
      self.initialized.store(false, Ordering::SeqCst);
      db.close().await
   }

   /// Whether the schema has been initialized for the current database.
   pub fn is_initialized(&self) -> bool {
      self.initialized.load(Ordering::SeqCst)
   }
}

impl std::fmt::Debug for ConnectionManager {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("ConnectionManager")
         .field("settings", &self.settings)
         .field("initialized", &self.is_initialized())
         .finish_non_exhaustive()
   }
}

impl From<Database> for Adapter {
   fn from(db: Database) -> Self {
      db.adapter
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::Error;

   #[tokio::test]
   async fn test_mysql_without_url_is_fatal() {
      let settings = DbSettings {
         backend: BackendKind::MySql,
         ..Default::default()
      };
      let err = Database::open(&settings).await.unwrap_err();
      assert!(matches!(err, Error::MissingDatabaseUrl));
      assert_eq!(err.error_code(), "MISSING_DATABASE_URL");
   }

   #[tokio::test]
   async fn test_mysql_invalid_url() {
      let err = Database::open(&DbSettings::mysql("postgres://u@h/db"))
         .await
         .unwrap_err();
      assert_eq!(err.error_code(), "INVALID_DATABASE_URL");
   }

   #[tokio::test]
   async fn test_close_db_before_get_db_is_noop() {
      let manager = ConnectionManager::new(DbSettings::sqlite(":memory:"));
      manager.close_db().await.unwrap();
      assert!(!manager.is_initialized());
   }
}
