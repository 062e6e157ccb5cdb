use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use outfit_conn_mgr::{MySqlDatabase, MySqlPoolConfig, SqliteDatabase, SqliteDatabaseConfig};
use serde_json::Value as JsonValue;

use crate::bind::{mysql_query, sqlite_query};
use crate::decode::{JsonRow, decode_mysql_rows, decode_sqlite_rows};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::executor::{Executor, WriteQueryResult, is_read_only};
use crate::transactions::{ForeignKeys, Transaction, TransactionConn, run_transaction};

/// Adapter over an embedded SQLite database.
///
/// Read-only statements are served by the read pool, everything else by the single writer.
/// Cloning is cheap and every clone shares the same pools.
#[derive(Clone, Debug)]
pub struct SqliteAdapter {
   inner: Arc<SqliteDatabase>,
   returning: bool,
}

impl SqliteAdapter {
   /// Connect to a SQLite database
   ///
   /// # Example
   ///
   /// ```no_run
   /// use outfit_toolkit::SqliteAdapter;
   ///
   /// # async fn example() -> Result<(), outfit_toolkit::Error> {
   /// let db = SqliteAdapter::connect("data/outfit-platform.db", None).await?;
   /// # Ok(())
   /// # }
   /// ```
   pub async fn connect(
      path: impl AsRef<Path>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Self> {
      let inner = SqliteDatabase::connect(path, custom_config).await?;
      Ok(Self::new(inner))
   }

   pub fn new(inner: Arc<SqliteDatabase>) -> Self {
      Self {
         inner,
         returning: Dialect::Sqlite.supports_returning(),
      }
   }

   /// Enable or disable `RETURNING` clauses for the mutation helpers.
   ///
   /// Disabled, the helpers fall back to the same read-back queries used on MySQL. Needed for
   /// SQLite builds older than 3.35.
   pub fn with_returning(mut self, enabled: bool) -> Self {
      self.returning = enabled;
      self
   }

   /// Get the inner Arc<SqliteDatabase> for advanced usage
   pub fn inner(&self) -> &Arc<SqliteDatabase> {
      &self.inner
   }

   /// Run `f` in a transaction on the writer: `BEGIN IMMEDIATE`, then `COMMIT` when it
   /// returns `Ok` or `ROLLBACK` when it returns `Err`.
   pub async fn transaction<T, F>(&self, f: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
      T: Send,
   {
      self.run(ForeignKeys::Enforced, f).await
   }

   /// Like [`SqliteAdapter::transaction`], with foreign-key enforcement switched off until
   /// the transaction ends. For table rebuilds.
   pub async fn transaction_unchecked<T, F>(&self, f: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
      T: Send,
   {
      self.run(ForeignKeys::Suspended, f).await
   }

   async fn run<T, F>(&self, foreign_keys: ForeignKeys, f: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
      T: Send,
   {
      let writer = self.inner.acquire_writer().await?;
      run_transaction(
         TransactionConn::Sqlite(writer),
         Dialect::Sqlite,
         self.returning,
         foreign_keys,
         f,
      )
      .await
   }

   /// Close the database. Idempotent.
   pub async fn close(&self) -> Result<()> {
      self.inner.close().await?;
      Ok(())
   }

   /// Close the database and delete its files.
   pub async fn remove(self) -> Result<()> {
      self.inner.remove().await?;
      Ok(())
   }
}

#[async_trait]
impl Executor for SqliteAdapter {
   fn dialect(&self) -> Dialect {
      Dialect::Sqlite
   }

   fn supports_returning(&self) -> bool {
      self.returning
   }

   async fn fetch_all(&self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      let query = sqlite_query(sql, values);
      let rows = if is_read_only(sql) {
         query.fetch_all(self.inner.read_pool()?).await?
      } else {
         let mut writer = self.inner.acquire_writer().await?;
         query.fetch_all(&mut *writer).await?
      };
      decode_sqlite_rows(rows)
   }

   async fn execute(&self, sql: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let mut writer = self.inner.acquire_writer().await?;
      let result = sqlite_query(sql, values).execute(&mut *writer).await?;
      Ok(WriteQueryResult::new(
         result.rows_affected(),
         result.last_insert_rowid(),
      ))
   }

   async fn execute_batch(&self, sql: &str) -> Result<()> {
      let mut writer = self.inner.acquire_writer().await?;
      sqlx::Executor::execute(&mut *writer, sql).await?;
      Ok(())
   }
}

/// Adapter over a MySQL/MariaDB connection pool.
///
/// Each call acquires its own pooled connection, which is released when the call returns,
/// whether it succeeded or not.
#[derive(Clone, Debug)]
pub struct MySqlAdapter {
   inner: Arc<MySqlDatabase>,
}

impl MySqlAdapter {
   pub async fn connect(url: &str, custom_config: Option<MySqlPoolConfig>) -> Result<Self> {
      let inner = MySqlDatabase::connect(url, custom_config).await?;
      Ok(Self::new(inner))
   }

   pub fn new(inner: Arc<MySqlDatabase>) -> Self {
      Self { inner }
   }

   pub fn inner(&self) -> &Arc<MySqlDatabase> {
      &self.inner
   }

   /// Run `f` in a transaction on one pooled connection: `START TRANSACTION`, then `COMMIT`
   /// when it returns `Ok` or `ROLLBACK` when it returns `Err`.
   pub async fn transaction<T, F>(&self, f: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
      T: Send,
   {
      self.run(ForeignKeys::Enforced, f).await
   }

   /// Like [`MySqlAdapter::transaction`], with `FOREIGN_KEY_CHECKS` off until the
   /// transaction ends.
   pub async fn transaction_unchecked<T, F>(&self, f: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
      T: Send,
   {
      self.run(ForeignKeys::Suspended, f).await
   }

   async fn run<T, F>(&self, foreign_keys: ForeignKeys, f: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
      T: Send,
   {
      let conn = self.inner.acquire().await?;
      run_transaction(
         TransactionConn::MySql(conn),
         Dialect::MySql,
         false,
         foreign_keys,
         f,
      )
      .await
   }

   /// Close the pool. Idempotent.
   pub async fn close(&self) -> Result<()> {
      self.inner.close().await?;
      Ok(())
   }
}

#[async_trait]
impl Executor for MySqlAdapter {
   fn dialect(&self) -> Dialect {
      Dialect::MySql
   }

   async fn fetch_all(&self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      let mut conn = self.inner.acquire().await?;
      let rows = mysql_query(sql, values).fetch_all(&mut *conn).await?;
      decode_mysql_rows(rows)
   }

   async fn execute(&self, sql: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let mut conn = self.inner.acquire().await?;
      let result = mysql_query(sql, values).execute(&mut *conn).await?;
      Ok(WriteQueryResult::new(
         result.rows_affected(),
         i64::try_from(result.last_insert_id()).unwrap_or(i64::MAX),
      ))
   }

   async fn execute_batch(&self, sql: &str) -> Result<()> {
      let mut conn = self.inner.acquire().await?;
      sqlx::Executor::execute(&mut *conn, sql).await?;
      Ok(())
   }
}

/// The configured backend.
///
/// Application code holds an `Adapter` and never needs to know which database is behind it.
#[derive(Clone, Debug)]
pub enum Adapter {
   Sqlite(SqliteAdapter),
   MySql(MySqlAdapter),
}

impl Adapter {
   /// See [`SqliteAdapter::transaction`] and [`MySqlAdapter::transaction`].
   ///
   /// # Example
   ///
   /// ```no_run
   /// use outfit_toolkit::{Adapter, Executor};
   /// use serde_json::json;
   ///
   /// # async fn example(db: &Adapter) -> Result<(), outfit_toolkit::Error> {
   /// let outfit_id = 7;
   /// db.transaction(move |tx| {
   ///    Box::pin(async move {
   ///       tx.execute("DELETE FROM outfit_items WHERE outfit_id = ?", vec![json!(outfit_id)])
   ///          .await?;
   ///       tx.execute("DELETE FROM outfits WHERE id = ?", vec![json!(outfit_id)])
   ///          .await?;
   ///       Ok(())
   ///    })
   /// })
   /// .await?;
   /// # Ok(())
   /// # }
   /// ```
   pub async fn transaction<T, F>(&self, f: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
      T: Send,
   {
      match self {
         Adapter::Sqlite(db) => db.transaction(f).await,
         Adapter::MySql(db) => db.transaction(f).await,
      }
   }

   /// Transaction with foreign-key enforcement suspended until it ends.
   pub async fn transaction_unchecked<T, F>(&self, f: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
      T: Send,
   {
      match self {
         Adapter::Sqlite(db) => db.transaction_unchecked(f).await,
         Adapter::MySql(db) => db.transaction_unchecked(f).await,
      }
   }

   /// Release every pooled connection. Idempotent; later calls fail with a closed error.
   pub async fn close(&self) -> Result<()> {
      match self {
         Adapter::Sqlite(db) => db.close().await,
         Adapter::MySql(db) => db.close().await,
      }
   }

   pub fn is_closed(&self) -> bool {
      match self {
         Adapter::Sqlite(db) => db.inner().is_closed(),
         Adapter::MySql(db) => db.inner().is_closed(),
      }
   }

   fn executor(&self) -> &dyn Executor {
      match self {
         Adapter::Sqlite(db) => db,
         Adapter::MySql(db) => db,
      }
   }
}

impl From<SqliteAdapter> for Adapter {
   fn from(db: SqliteAdapter) -> Self {
      Adapter::Sqlite(db)
   }
}

impl From<MySqlAdapter> for Adapter {
   fn from(db: MySqlAdapter) -> Self {
      Adapter::MySql(db)
   }
}

#[async_trait]
impl Executor for Adapter {
   fn dialect(&self) -> Dialect {
      self.executor().dialect()
   }

   fn supports_returning(&self) -> bool {
      self.executor().supports_returning()
   }

   async fn fetch_all(&self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      self.executor().fetch_all(sql, values).await
   }

   async fn execute(&self, sql: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      self.executor().execute(sql, values).await
   }

   async fn execute_batch(&self, sql: &str) -> Result<()> {
      self.executor().execute_batch(sql).await
   }
}
