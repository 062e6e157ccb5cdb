//! SQLite database with connection pooling and serialized write access

use crate::Result;
use crate::config::SqliteDatabaseConfig;
use crate::error::Error;
use crate::write_guard::WriteGuard;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const MEMORY_PATH: &str = ":memory:";

/// SQLite database with connection pooling for concurrent reads and exclusive writes.
///
/// Read-only statements go through `read_pool()`. Everything else goes through the single
/// write connection returned by `acquire_writer()`. WAL mode, `synchronous = NORMAL` and
/// foreign-key enforcement are applied while connecting, before any caller can write.
///
/// `:memory:` databases are served by one shared connection used for both reads and writes,
/// since every new in-memory connection would otherwise see its own empty database.
///
/// # Example
///
/// ```no_run
/// use outfit_conn_mgr::SqliteDatabase;
///
/// # async fn example() -> Result<(), outfit_conn_mgr::Error> {
/// let db = SqliteDatabase::connect("data/outfit-platform.db", None).await?;
///
/// let rows = sqlx::query("SELECT * FROM clothing_categories")
///     .fetch_all(db.read_pool()?)
///     .await?;
///
/// let mut writer = db.acquire_writer().await?;
/// sqlx::query("DELETE FROM sessions WHERE expires_at < datetime('now')")
///     .execute(&mut *writer)
///     .await?;
/// drop(writer);
///
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteDatabase {
   /// Pool of read-only connections (defaults to max_connections=6) for concurrent reads
   read_pool: Pool<Sqlite>,

   /// Single read-write connection pool (max_connections=1) for serialized writes
   write_conn: Pool<Sqlite>,

   /// Marks database as closed to prevent further operations
   closed: AtomicBool,

   /// Path to database file (used for cleanup)
   path: PathBuf,
}

impl SqliteDatabase {
   /// Connect to a SQLite database
   ///
   /// The parent directory and the database file are created if they don't exist.
   ///
   /// # Arguments
   ///
   /// * `path` - Path to the SQLite database file, or `:memory:`
   /// * `custom_config` - Optional custom configuration for connection pools.
   ///   Pass `None` to use defaults (6 max read connections, 30 second idle timeout).
   pub async fn connect(
      path: impl AsRef<Path>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Arc<Self>> {
      let config = custom_config.unwrap_or_default();
      let path = path.as_ref();

      if path.as_os_str().is_empty() {
         return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Database path cannot be empty",
         )));
      }

      if is_memory_database(path) {
         return Self::connect_memory().await;
      }

      let path = path.to_path_buf();

      if let Some(parent) = path.parent()
         && !parent.as_os_str().is_empty()
      {
         std::fs::create_dir_all(parent)?;
      }

      // The read pool is read-only and cannot create the file, so create it up front in case
      // the first statement issued is a read
      if !path.exists() {
         let create_options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .read_only(false);

         let conn = create_options.connect().await?;
         drop(conn);
         debug!("Created SQLite database file at {}", path.display());
      }

      let idle_timeout = Some(Duration::from_secs(config.idle_timeout_secs));

      let read_options = SqliteConnectOptions::new()
         .filename(&path)
         .read_only(true)
         .foreign_keys(true);

      let read_pool = SqlitePoolOptions::new()
         .max_connections(config.max_read_connections)
         .min_connections(0)
         .idle_timeout(idle_timeout)
         .connect_with(read_options)
         .await?;

      let write_options = SqliteConnectOptions::new()
         .filename(&path)
         .read_only(false)
         .foreign_keys(true);

      let write_conn = SqlitePoolOptions::new()
         .max_connections(1)
         .min_connections(0)
         .idle_timeout(idle_timeout)
         .connect_with(write_options)
         .await?;

      let db = Self {
         read_pool,
         write_conn,
         closed: AtomicBool::new(false),
         path,
      };

      db.enable_wal().await?;

      Ok(Arc::new(db))
   }

   async fn connect_memory() -> Result<Arc<Self>> {
      let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

      // The in-memory database lives exactly as long as its one connection
      let pool = SqlitePoolOptions::new()
         .max_connections(1)
         .min_connections(1)
         .idle_timeout(None)
         .max_lifetime(None)
         .connect_with(options)
         .await?;

      Ok(Arc::new(Self {
         read_pool: pool.clone(),
         write_conn: pool,
         closed: AtomicBool::new(false),
         path: PathBuf::from(MEMORY_PATH),
      }))
   }

   /// Journal mode is persistent in the file, synchronous is per connection. The write pool
   /// holds a single connection, so both settings stick until it idles out; after that
   /// SQLite's default synchronous level applies, which is only ever stricter.
   async fn enable_wal(&self) -> Result<()> {
      let mut conn = self.write_conn.acquire().await?;

      sqlx::query("PRAGMA journal_mode = WAL")
         .execute(&mut *conn)
         .await?;

      // https://www.sqlite.org/wal.html#performance_considerations
      sqlx::query("PRAGMA synchronous = NORMAL")
         .execute(&mut *conn)
         .await?;

      Ok(())
   }

   /// Get a reference to the connection pool for executing read queries
   ///
   /// Use this for concurrent read operations. Multiple readers can access
   /// the pool simultaneously.
   pub fn read_pool(&self) -> Result<&Pool<Sqlite>> {
      if self.closed.load(Ordering::SeqCst) {
         return Err(Error::DatabaseClosed);
      }
      Ok(&self.read_pool)
   }

   /// Acquire exclusive write access to the database
   ///
   /// Returns a `WriteGuard` over the single write connection. Only one writer can exist at a
   /// time; other callers wait until the guard is dropped.
   pub async fn acquire_writer(&self) -> Result<WriteGuard> {
      if self.closed.load(Ordering::SeqCst) {
         return Err(Error::DatabaseClosed);
      }

      let conn = self.write_conn.acquire().await?;

      Ok(WriteGuard::new(conn))
   }

   /// Path of the database file, or `:memory:`
   pub fn path(&self) -> &Path {
      &self.path
   }

   pub fn is_memory(&self) -> bool {
      is_memory_database(&self.path)
   }

   pub fn is_closed(&self) -> bool {
      self.closed.load(Ordering::SeqCst)
   }

   /// Close the database and release its connections
   ///
   /// After calling close, any operations on this database will return `Error::DatabaseClosed`.
   /// Calling it again is a no-op.
   pub async fn close(&self) -> Result<()> {
      if self.closed.swap(true, Ordering::SeqCst) {
         return Ok(());
      }

      // This will await all readers to be returned
      self.read_pool.close().await;

      // Flush the WAL into the main file and truncate it
      if !self.is_memory()
         && let Ok(mut conn) = self.write_conn.acquire().await
         && let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&mut *conn)
            .await
      {
         warn!("WAL checkpoint on close failed: {}", e);
      }

      self.write_conn.close().await;

      debug!("Closed SQLite database at {}", self.path.display());

      Ok(())
   }

   /// Close the database and delete all database files
   ///
   /// This closes all connections and then deletes the database file,
   /// WAL file, and SHM file from disk. Use with caution!
   pub async fn remove(self: Arc<Self>) -> Result<()> {
      self.close().await?;

      if self.is_memory() {
         return Ok(());
      }

      // Remove main database file - propagate errors (file should exist)
      std::fs::remove_file(&self.path).map_err(Error::Io)?;

      // WAL and SHM files may not exist if the database was never written to
      for suffix in ["-wal", "-shm"] {
         if let Err(e) = std::fs::remove_file(sidecar_path(&self.path, suffix))
            && e.kind() != std::io::ErrorKind::NotFound
         {
            return Err(Error::Io(e));
         }
      }

      Ok(())
   }
}

fn is_memory_database(path: &Path) -> bool {
   path.as_os_str() == MEMORY_PATH
}

/// `data/outfit.db` -> `data/outfit.db-wal`
fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
   let mut name = OsString::from(path.as_os_str());
   name.push(suffix);
   PathBuf::from(name)
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_sidecar_path() {
      assert_eq!(
         sidecar_path(Path::new("data/outfit-platform.db"), "-wal"),
         PathBuf::from("data/outfit-platform.db-wal")
      );
      assert_eq!(
         sidecar_path(Path::new("wardrobe"), "-shm"),
         PathBuf::from("wardrobe-shm")
      );
   }

   #[test]
   fn test_is_memory_database() {
      assert!(is_memory_database(Path::new(":memory:")));
      assert!(!is_memory_database(Path::new("memory.db")));
   }

   #[tokio::test]
   async fn test_empty_path_rejected() {
      let result = SqliteDatabase::connect("", None).await;
      assert!(matches!(result, Err(Error::Io(_))));
   }

   #[tokio::test]
   async fn test_memory_database_shares_one_connection() {
      let db = SqliteDatabase::connect(":memory:", None).await.unwrap();
      assert!(db.is_memory());

      let mut writer = db.acquire_writer().await.unwrap();
      sqlx::query("CREATE TABLE test (id INTEGER)")
         .execute(&mut *writer)
         .await
         .unwrap();
      sqlx::query("INSERT INTO test (id) VALUES (7)")
         .execute(&mut *writer)
         .await
         .unwrap();
      drop(writer);

      // Reads see the writer's table because both go through the same connection
      let (id,): (i64,) = sqlx::query_as("SELECT id FROM test")
         .fetch_one(db.read_pool().unwrap())
         .await
         .unwrap();
      assert_eq!(id, 7);

      db.remove().await.unwrap();
   }

   #[tokio::test]
   async fn test_memory_databases_are_independent() {
      let db1 = SqliteDatabase::connect(":memory:", None).await.unwrap();
      let db2 = SqliteDatabase::connect(":memory:", None).await.unwrap();

      let mut writer1 = db1.acquire_writer().await.unwrap();
      sqlx::query("CREATE TABLE test (id INTEGER)")
         .execute(&mut *writer1)
         .await
         .unwrap();
      drop(writer1);

      let result = sqlx::query("SELECT * FROM test")
         .fetch_optional(db2.read_pool().unwrap())
         .await;

      assert!(
         result.is_err(),
         "Second :memory: database should not have table from first"
      );

      db1.close().await.unwrap();
      db2.close().await.unwrap();
   }
}
