//! The capability set shared by adapters and open transactions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::decode::JsonRow;
use crate::dialect::Dialect;
use crate::error::Result;

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// Id generated by the last INSERT on this connection.
   ///
   /// `None` when the driver reports 0, which both backends do for statements that
   /// generated no id.
   pub last_insert_id: Option<i64>,
}

impl WriteQueryResult {
   pub(crate) fn new(rows_affected: u64, last_insert_id: i64) -> Self {
      Self {
         rows_affected,
         last_insert_id: (last_insert_id > 0).then_some(last_insert_id),
      }
   }
}

/// Something that can run SQL: an adapter, or a transaction opened on one.
///
/// Parameters use positional `?` placeholders on both backends. Rows come back as
/// [`JsonRow`] maps with values normalized across backends.
#[async_trait]
pub trait Executor: Send + Sync {
   fn dialect(&self) -> Dialect;

   /// Whether `RETURNING` clauses may be emitted on this executor.
   fn supports_returning(&self) -> bool {
      self.dialect().supports_returning()
   }

   /// Run a statement and return every row it produces.
   async fn fetch_all(&self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>>;

   /// Run a statement and return its first row, if any.
   async fn fetch_optional(&self, sql: &str, values: Vec<JsonValue>) -> Result<Option<JsonRow>> {
      Ok(self.fetch_all(sql, values).await?.into_iter().next())
   }

   /// Run a single statement for its side effects.
   async fn execute(&self, sql: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult>;

   /// Run a script of `;`-separated statements without parameters in one round trip.
   async fn execute_batch(&self, sql: &str) -> Result<()>;

   /// Read rows.
   async fn query(&self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      self.fetch_all(sql, values).await
   }

   /// Run SQL for its side effects.
   ///
   /// Without parameters the text may hold several statements and is sent as one
   /// batch. With parameters it must be a single statement.
   async fn exec(&self, sql: &str, values: Vec<JsonValue>) -> Result<()> {
      if values.is_empty() {
         self.execute_batch(sql).await
      } else {
         self.execute(sql, values).await.map(|_| ())
      }
   }

   /// Create a reusable statement handle for `sql`.
   fn prepare(&self, sql: impl Into<String>) -> Statement<'_, Self>
   where
      Self: Sized,
   {
      Statement::new(self, sql)
   }
}

/// A SQL text bound to an executor, runnable any number of times with different parameters.
///
/// # Example
///
/// ```no_run
/// use outfit_toolkit::{Executor, SqliteAdapter};
/// use serde_json::json;
///
/// # async fn example(db: &SqliteAdapter) -> Result<(), outfit_toolkit::Error> {
/// let by_user = db.prepare("SELECT * FROM clothing_categories WHERE user_id = ?");
/// let alice = by_user.all(vec![json!(1)]).await?;
/// let bob = by_user.all(vec![json!(2)]).await?;
/// # Ok(())
/// # }
/// ```
pub struct Statement<'e, E: ?Sized> {
   executor: &'e E,
   sql: String,
}

impl<'e, E: Executor + ?Sized> Statement<'e, E> {
   pub fn new(executor: &'e E, sql: impl Into<String>) -> Self {
      Self {
         executor,
         sql: sql.into(),
      }
   }

   pub fn sql(&self) -> &str {
      &self.sql
   }

   /// First row, or `None` when nothing matches.
   pub async fn get(&self, values: Vec<JsonValue>) -> Result<Option<JsonRow>> {
      self.executor.fetch_optional(&self.sql, values).await
   }

   pub async fn all(&self, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      self.executor.fetch_all(&self.sql, values).await
   }

   pub async fn run(&self, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      self.executor.execute(&self.sql, values).await
   }
}

/// Whether `sql` can run on a read-only connection.
///
/// Leading comments and whitespace are skipped. Anything with a `RETURNING` clause is a write.
pub fn is_read_only(sql: &str) -> bool {
   let sql = skip_leading_comments(sql);
   let keyword: String = sql
      .chars()
      .take_while(|c| c.is_ascii_alphabetic())
      .collect::<String>()
      .to_ascii_uppercase();

   match keyword.as_str() {
      "SELECT" | "EXPLAIN" | "VALUES" => !contains_keyword(sql, "RETURNING"),
      // A CTE may front a write
      "WITH" => !["INSERT", "UPDATE", "DELETE", "REPLACE", "RETURNING"]
         .iter()
         .any(|kw| contains_keyword(sql, kw)),
      "PRAGMA" => !sql.contains('='),
      _ => false,
   }
}

fn skip_leading_comments(mut sql: &str) -> &str {
   loop {
      sql = sql.trim_start();
      if let Some(rest) = sql.strip_prefix("--") {
         sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
      } else if let Some(rest) = sql.strip_prefix("/*") {
         sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
      } else {
         return sql;
      }
   }
}

fn contains_keyword(sql: &str, keyword: &str) -> bool {
   sql.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
      .any(|word| word.eq_ignore_ascii_case(keyword))
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_write_query_result_zero_id_is_none() {
      assert_eq!(WriteQueryResult::new(0, 0).last_insert_id, None);
      assert_eq!(WriteQueryResult::new(1, 42).last_insert_id, Some(42));
   }

   #[test]
   fn test_read_only_detection() {
      assert!(is_read_only("SELECT * FROM users"));
      assert!(is_read_only("  select 1"));
      assert!(is_read_only("WITH x AS (SELECT 1) SELECT * FROM x"));
      assert!(is_read_only("-- list\nSELECT name FROM sqlite_master"));
      assert!(is_read_only("/* probe */ PRAGMA table_info(users)"));

      assert!(!is_read_only("INSERT INTO users (email) VALUES (?)"));
      assert!(!is_read_only("UPDATE users SET email = ?"));
      assert!(!is_read_only("DELETE FROM users WHERE id = ? RETURNING *"));
      assert!(!is_read_only("PRAGMA foreign_keys = OFF"));
      assert!(!is_read_only("CREATE TABLE t (id INTEGER)"));
      assert!(!is_read_only(""));
   }

   #[test]
   fn test_cte_fronting_a_write_is_not_read_only() {
      assert!(!is_read_only(
         "WITH old AS (SELECT id FROM sessions) DELETE FROM sessions WHERE id IN (SELECT id FROM old)"
      ));
   }

   #[test]
   fn test_returning_must_be_a_whole_word() {
      assert!(is_read_only("SELECT returning_user FROM audit"));
      assert!(!is_read_only(
         "WITH d AS (SELECT 1) DELETE FROM t WHERE id IN (SELECT * FROM d) RETURNING id"
      ));
   }
}
