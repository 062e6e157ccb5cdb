//! Binding JSON parameter values to positional `?` placeholders.

use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Sqlite};

/// A JSON parameter reduced to one of the storage classes both backends accept.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
   Null,
   Integer(i64),
   Real(f64),
   Text(String),
}

impl From<JsonValue> for BindValue {
   fn from(value: JsonValue) -> Self {
      match value {
         JsonValue::Null => BindValue::Null,
         JsonValue::Bool(b) => BindValue::Integer(i64::from(b)),
         JsonValue::Number(number) => {
            // Preserve integer precision by binding as i64 when possible
            if let Some(int_val) = number.as_i64() {
               BindValue::Integer(int_val)
            } else if let Some(uint_val) = number.as_u64() {
               // Larger than i64::MAX, bind as f64 (will lose precision)
               BindValue::Real(uint_val as f64)
            } else {
               BindValue::Real(number.as_f64().unwrap_or_default())
            }
         }
         JsonValue::String(s) => BindValue::Text(s),
         // Structured values are stored as their JSON text
         other @ (JsonValue::Array(_) | JsonValue::Object(_)) => BindValue::Text(other.to_string()),
      }
   }
}

/// Helper function to bind a JSON value to a SQLite query
pub fn bind_sqlite<'q>(
   query: Query<'q, Sqlite, SqliteArguments<'q>>,
   value: JsonValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
   match BindValue::from(value) {
      BindValue::Null => query.bind(None::<i64>),
      BindValue::Integer(v) => query.bind(v),
      BindValue::Real(v) => query.bind(v),
      BindValue::Text(v) => query.bind(v),
   }
}

/// Helper function to bind a JSON value to a MySQL query
pub fn bind_mysql(
   query: Query<'_, MySql, MySqlArguments>,
   value: JsonValue,
) -> Query<'_, MySql, MySqlArguments> {
   match BindValue::from(value) {
      BindValue::Null => query.bind(None::<i64>),
      BindValue::Integer(v) => query.bind(v),
      BindValue::Real(v) => query.bind(v),
      BindValue::Text(v) => query.bind(v),
   }
}

pub(crate) fn sqlite_query(
   sql: &str,
   values: Vec<JsonValue>,
) -> Query<'_, Sqlite, SqliteArguments<'_>> {
   values.into_iter().fold(sqlx::query(sql), bind_sqlite)
}

pub(crate) fn mysql_query(sql: &str, values: Vec<JsonValue>) -> Query<'_, MySql, MySqlArguments> {
   values.into_iter().fold(sqlx::query(sql), bind_mysql)
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_bind_value_conversions() {
      assert_eq!(BindValue::from(json!(null)), BindValue::Null);
      assert_eq!(BindValue::from(json!(true)), BindValue::Integer(1));
      assert_eq!(BindValue::from(json!(false)), BindValue::Integer(0));
      assert_eq!(BindValue::from(json!(-42)), BindValue::Integer(-42));
      assert_eq!(BindValue::from(json!(1.5)), BindValue::Real(1.5));
      assert_eq!(BindValue::from(json!("外套")), BindValue::Text("外套".into()));
   }

   #[test]
   fn test_bind_value_large_unsigned() {
      let big = u64::MAX;
      assert_eq!(BindValue::from(json!(big)), BindValue::Real(big as f64));
   }

   #[test]
   fn test_bind_value_structured_as_json_text() {
      assert_eq!(
         BindValue::from(json!({"color": "red"})),
         BindValue::Text(r#"{"color":"red"}"#.into())
      );
      assert_eq!(BindValue::from(json!([1, 2])), BindValue::Text("[1,2]".into()));
   }
}
