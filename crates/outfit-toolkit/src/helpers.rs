//! Mutation helpers that return the affected row on both backends.
//!
//! SQLite can hand the row back with `RETURNING *`; MySQL cannot, so there the row is
//! read back with a second query. Callers get the same row either way.
//!
//! Table names, column names and WHERE fragments are interpolated into the SQL and must
//! come from code, never from user input. Values are always bound as parameters.

use serde_json::Value as JsonValue;

use crate::decode::JsonRow;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::wrapper::Adapter;

/// Insert one row and return it as stored, including generated `id` and defaults.
///
/// Tables are expected to have an auto-generated integer `id` column.
///
/// # Example
///
/// ```no_run
/// use outfit_toolkit::{Adapter, helpers::insert_and_get};
/// use serde_json::json;
///
/// # async fn example(db: &Adapter) -> Result<(), outfit_toolkit::Error> {
/// let category = insert_and_get(
///    db,
///    "clothing_categories",
///    &["user_id", "name"],
///    vec![json!(1), json!("围巾")],
/// )
/// .await?;
/// assert_eq!(category["name"], json!("围巾"));
/// # Ok(())
/// # }
/// ```
pub async fn insert_and_get<E>(
   db: &E,
   table: &str,
   columns: &[&str],
   values: Vec<JsonValue>,
) -> Result<JsonRow>
where
   E: Executor + ?Sized,
{
   let placeholders = vec!["?"; columns.len()].join(", ");
   let sql = format!(
      "INSERT INTO {table} ({}) VALUES ({placeholders})",
      columns.join(", ")
   );

   if db.supports_returning() {
      return db
         .fetch_optional(&format!("{sql} RETURNING *"), values)
         .await
         .map_err(Error::into_constraint)?
         .ok_or_else(|| Error::RowNotReturned(table.to_string()));
   }

   let result = db
      .execute(&sql, values)
      .await
      .map_err(Error::into_constraint)?;

   let id = result
      .last_insert_id
      .ok_or_else(|| Error::RowNotReturned(table.to_string()))?;

   db.fetch_optional(
      &format!("SELECT * FROM {table} WHERE id = ?"),
      vec![JsonValue::from(id)],
   )
   .await?
   .ok_or_else(|| Error::RowNotReturned(table.to_string()))
}

/// Update rows matching `where_fragments` and return the first updated row.
///
/// `set_fragments` are `column = ?` pieces joined with `, `; `where_fragments` are
/// conditions joined with ` AND `. Values bind in order: SET values, then WHERE values.
/// Returns `None` when nothing matched.
pub async fn update_and_get<E>(
   db: &E,
   table: &str,
   set_fragments: &[&str],
   set_values: Vec<JsonValue>,
   where_fragments: &[&str],
   where_values: Vec<JsonValue>,
) -> Result<Option<JsonRow>>
where
   E: Executor + ?Sized,
{
   let where_clause = where_clause("UPDATE", where_fragments)?;
   let sql = format!(
      "UPDATE {table} SET {} WHERE {where_clause}",
      set_fragments.join(", ")
   );

   let mut values = set_values;
   values.extend(where_values.iter().cloned());

   if db.supports_returning() {
      return db
         .fetch_optional(&format!("{sql} RETURNING *"), values)
         .await
         .map_err(Error::into_constraint);
   }

   // MySQL counts matched rows whose values did not change as unaffected, so the
   // affected-row count cannot tell "no match" apart from "no change"; re-read instead
   db.execute(&sql, values)
      .await
      .map_err(Error::into_constraint)?;

   db.fetch_optional(
      &format!("SELECT * FROM {table} WHERE {where_clause}"),
      where_values,
   )
   .await
}

/// Delete rows matching `where_fragments` and return the first deleted row as it was.
///
/// Returns `None` without deleting anything when nothing matched. Without `RETURNING`,
/// the read and the delete run in one transaction so no concurrent writer can slip a
/// change in between.
pub async fn delete_and_get(
   db: &Adapter,
   table: &str,
   where_fragments: &[&str],
   where_values: Vec<JsonValue>,
) -> Result<Option<JsonRow>> {
   if db.supports_returning() {
      return delete_and_get_in(db, table, where_fragments, where_values).await;
   }

   let table = table.to_string();
   let where_fragments: Vec<String> = where_fragments.iter().map(|f| f.to_string()).collect();

   db.transaction(move |tx| {
      Box::pin(async move {
         let fragments: Vec<&str> = where_fragments.iter().map(String::as_str).collect();
         delete_and_get_in(tx, &table, &fragments, where_values).await
      })
   })
   .await
}

/// [`delete_and_get`] for an executor that is already a transaction (or where the
/// read-then-delete race does not matter).
pub async fn delete_and_get_in<E>(
   db: &E,
   table: &str,
   where_fragments: &[&str],
   where_values: Vec<JsonValue>,
) -> Result<Option<JsonRow>>
where
   E: Executor + ?Sized,
{
   let where_clause = where_clause("DELETE", where_fragments)?;
   let delete = format!("DELETE FROM {table} WHERE {where_clause}");

   if db.supports_returning() {
      return db
         .fetch_optional(&format!("{delete} RETURNING *"), where_values)
         .await
         .map_err(Error::into_constraint);
   }

   let existing = db
      .fetch_optional(
         &format!("SELECT * FROM {table} WHERE {where_clause}"),
         where_values.clone(),
      )
      .await?;

   if existing.is_none() {
      return Ok(None);
   }

   db.execute(&delete, where_values)
      .await
      .map_err(Error::into_constraint)?;

   Ok(existing)
}

/// SQL expression for the current timestamp on `dialect`.
pub fn now_function(dialect: Dialect) -> &'static str {
   dialect.now()
}

fn where_clause(operation: &'static str, fragments: &[&str]) -> Result<String> {
   if fragments.iter().all(|f| f.trim().is_empty()) {
      return Err(Error::EmptyWhereClause(operation));
   }
   Ok(fragments
      .iter()
      .filter(|f| !f.trim().is_empty())
      .map(|f| format!("({f})"))
      .collect::<Vec<_>>()
      .join(" AND "))
}
