//! Exclusive handle on the SQLite writer

use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteConnection;
use std::ops::{Deref, DerefMut};

/// The SQLite writer connection, held exclusively.
///
/// The write pool has a single connection, so while one `WriteGuard` is alive every
/// other writer waits in [`crate::SqliteDatabase::acquire_writer`]. Dropping the guard
/// hands the connection back. Derefs to `SqliteConnection` for use with sqlx queries.
///
/// ```no_run
/// use outfit_conn_mgr::SqliteDatabase;
///
/// # async fn example() -> Result<(), outfit_conn_mgr::Error> {
/// let db = SqliteDatabase::connect("data/outfit-platform.db", None).await?;
/// let mut writer = db.acquire_writer().await?;
/// sqlx::query("DELETE FROM sessions WHERE expires_at < datetime('now')")
///    .execute(&mut *writer)
///    .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WriteGuard {
   conn: PoolConnection<Sqlite>,
}

impl WriteGuard {
   pub(crate) fn new(conn: PoolConnection<Sqlite>) -> Self {
      Self { conn }
   }

   /// Close the connection instead of handing it back, for a writer left in a state
   /// (open transaction, pragma changed) the next writer must not inherit. The pool
   /// opens a replacement on the next acquire.
   pub async fn close(self) -> crate::Result<()> {
      self.conn.close().await?;
      Ok(())
   }

   /// Like [`WriteGuard::close`], deferred to whenever the guard is dropped. Covers the
   /// cases where the holder cannot await, such as a cancelled future.
   pub fn close_on_drop(&mut self) {
      self.conn.close_on_drop();
   }
}

impl Deref for WriteGuard {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for WriteGuard {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}
