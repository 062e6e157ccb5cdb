//! Closure-scoped transactions over either backend

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use futures::future::BoxFuture;
use outfit_conn_mgr::WriteGuard;
use serde_json::Value as JsonValue;
use sqlx::MySql;
use sqlx::pool::PoolConnection;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::bind::{mysql_query, sqlite_query};
use crate::decode::{JsonRow, decode_mysql_rows, decode_sqlite_rows};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::{Executor, WriteQueryResult};

/// Whether foreign-key enforcement stays on for the duration of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeys {
   Enforced,
   /// Off from before `BEGIN` until after `COMMIT`/`ROLLBACK`. SQLite ignores the pragma
   /// inside an open transaction, so it has to be switched around it.
   Suspended,
}

/// The single connection a transaction runs on, for either backend
pub(crate) enum TransactionConn {
   Sqlite(WriteGuard),
   MySql(PoolConnection<MySql>),
}

impl TransactionConn {
   async fn fetch_all(&mut self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      match self {
         Self::Sqlite(w) => {
            let rows = sqlite_query(sql, values).fetch_all(&mut **w).await?;
            decode_sqlite_rows(rows)
         }
         Self::MySql(c) => {
            let rows = mysql_query(sql, values).fetch_all(&mut **c).await?;
            decode_mysql_rows(rows)
         }
      }
   }

   async fn execute(&mut self, sql: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      match self {
         Self::Sqlite(w) => {
            let result = sqlite_query(sql, values).execute(&mut **w).await?;
            Ok(WriteQueryResult::new(
               result.rows_affected(),
               result.last_insert_rowid(),
            ))
         }
         Self::MySql(c) => {
            let result = mysql_query(sql, values).execute(&mut **c).await?;
            Ok(WriteQueryResult::new(
               result.rows_affected(),
               i64::try_from(result.last_insert_id()).unwrap_or(i64::MAX),
            ))
         }
      }
   }

   async fn execute_batch(&mut self, sql: &str) -> Result<()> {
      match self {
         Self::Sqlite(w) => {
            sqlx::Executor::execute(&mut **w, sql).await?;
         }
         Self::MySql(c) => {
            sqlx::Executor::execute(&mut **c, sql).await?;
         }
      }
      Ok(())
   }

   async fn begin(&mut self) -> Result<()> {
      let sql = match self {
         // Take the write lock up front so the transaction never fails half-way on SQLITE_BUSY
         Self::Sqlite(_) => "BEGIN IMMEDIATE",
         Self::MySql(_) => "START TRANSACTION",
      };
      self.execute_batch(sql).await
   }

   async fn commit(&mut self) -> Result<()> {
      self.execute_batch("COMMIT").await
   }

   async fn rollback(&mut self) -> Result<()> {
      self.execute_batch("ROLLBACK").await
   }

   async fn set_foreign_keys(&mut self, enabled: bool) -> Result<()> {
      let sql = match (&*self, enabled) {
         (Self::Sqlite(_), true) => "PRAGMA foreign_keys = ON",
         (Self::Sqlite(_), false) => "PRAGMA foreign_keys = OFF",
         (Self::MySql(_), true) => "SET FOREIGN_KEY_CHECKS = 1",
         (Self::MySql(_), false) => "SET FOREIGN_KEY_CHECKS = 0",
      };
      self.execute_batch(sql).await
   }

   fn close_on_drop(&mut self) {
      match self {
         Self::Sqlite(w) => w.close_on_drop(),
         Self::MySql(c) => c.close_on_drop(),
      }
   }
}

/// Owns a [`TransactionConn`] from before `BEGIN` until the transaction has fully ended.
///
/// Dropped without [`ConnGuard::release`], for instance when the transaction future is
/// cancelled, the connection is closed rather than pooled. An open `BEGIN` or a suspended
/// foreign-key setting never reaches the next caller.
pub(crate) struct ConnGuard {
   conn: TransactionConn,
   released: bool,
}

impl ConnGuard {
   fn new(conn: TransactionConn) -> Self {
      Self {
         conn,
         released: false,
      }
   }

   /// Hand the connection back to its pool. Only once it is outside any transaction with
   /// foreign-key enforcement restored.
   fn release(mut self) {
      self.released = true;
   }
}

impl Deref for ConnGuard {
   type Target = TransactionConn;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for ConnGuard {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}

impl Drop for ConnGuard {
   fn drop(&mut self) {
      if !self.released {
         warn!("Transaction did not finish cleanly, discarding its connection");
         self.conn.close_on_drop();
      }
   }
}

/// An open transaction.
///
/// Implements [`Executor`], so the mutation helpers and [`crate::Statement`] work inside it
/// exactly as they do on an adapter. Statements run in order on one connection.
pub struct Transaction {
   conn: Mutex<ConnGuard>,
   dialect: Dialect,
   returning: bool,
}

impl Transaction {
   fn into_conn(self) -> ConnGuard {
      self.conn.into_inner()
   }
}

#[async_trait]
impl Executor for Transaction {
   fn dialect(&self) -> Dialect {
      self.dialect
   }

   fn supports_returning(&self) -> bool {
      self.returning
   }

   async fn fetch_all(&self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      self.conn.lock().await.fetch_all(sql, values).await
   }

   async fn execute(&self, sql: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      self.conn.lock().await.execute(sql, values).await
   }

   async fn execute_batch(&self, sql: &str) -> Result<()> {
      self.conn.lock().await.execute_batch(sql).await
   }
}

/// Run `f` inside a transaction on `conn`.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. The connection goes back
/// to its pool afterwards unless it could not be returned to a clean state, in which case it
/// is closed.
///
/// `f` borrows the [`Transaction`] for the lifetime of the future it returns, so anything it
/// captures must be owned.
pub(crate) async fn run_transaction<T, F>(
   conn: TransactionConn,
   dialect: Dialect,
   returning: bool,
   foreign_keys: ForeignKeys,
   f: F,
) -> Result<T>
where
   F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>> + Send,
   T: Send,
{
   let suspend = foreign_keys == ForeignKeys::Suspended;
   let mut conn = ConnGuard::new(conn);

   if suspend {
      conn.set_foreign_keys(false).await?;
   }

   if let Err(e) = conn.begin().await {
      restore_and_release(conn, suspend).await;
      return Err(e);
   }

   debug!("Transaction started ({}, foreign keys {:?})", dialect, foreign_keys);

   let tx = Transaction {
      conn: Mutex::new(conn),
      dialect,
      returning,
   };

   let outcome = f(&tx).await;
   let mut conn = tx.into_conn();

   let result = match outcome {
      Ok(value) => match conn.commit().await {
         Ok(()) => {
            debug!("Transaction committed");
            Ok(value)
         }
         Err(commit_err) => {
            error!("Transaction commit failed: {}", commit_err);
            if let Err(rollback_err) = conn.rollback().await {
               warn!("Rollback after failed commit also failed: {}", rollback_err);
               return Err(commit_err);
            }
            Err(commit_err)
         }
      },
      Err(e) => match conn.rollback().await {
         Ok(()) => {
            debug!("Transaction rolled back: {}", e);
            Err(e)
         }
         Err(rollback_err) => {
            error!(
               "Transaction failed: {}; rollback also failed: {}",
               e, rollback_err
            );
            return Err(Error::TransactionRollbackFailed {
               transaction_error: e.to_string(),
               rollback_error: rollback_err.to_string(),
            });
         }
      },
   };

   restore_and_release(conn, suspend).await;
   result
}

async fn restore_and_release(mut conn: ConnGuard, suspended: bool) {
   if suspended && let Err(e) = conn.set_foreign_keys(true).await {
      // A fresh connection comes up with enforcement on
      error!("Failed to re-enable foreign keys, discarding connection: {}", e);
      return;
   }
   conn.release();
}
