use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlValueRef};
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Row, TypeInfo, Value, ValueRef};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::Error;

/// A decoded row, keyed by column name in select order.
pub type JsonRow = IndexMap<String, JsonValue>;

const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
   format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Convert a SQLite value to a JSON value.
///
/// Note: BLOB values are returned as base64-encoded strings since JSON
/// has no native binary type. Boolean values are stored as INTEGER in SQLite.
pub fn sqlite_to_json(value: SqliteValueRef) -> Result<JsonValue, Error> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let column_type = value.type_info();

   // Handle types based on SQLite's type affinity
   let result = match column_type.name() {
      "TEXT" | "DATE" | "TIME" => value
         .to_owned()
         .try_decode::<String>()
         .map_or(JsonValue::Null, JsonValue::String),

      "REAL" => value
         .to_owned()
         .try_decode::<f64>()
         .map_or(JsonValue::Null, JsonValue::from),

      "INTEGER" | "NUMERIC" => value
         .to_owned()
         .try_decode::<i64>()
         .map_or(JsonValue::Null, JsonValue::from),

      "BOOLEAN" => value
         .to_owned()
         .try_decode::<bool>()
         .map_or(JsonValue::Null, |v| JsonValue::from(i64::from(v))),

      "DATETIME" => {
         if let Ok(dt) = value.to_owned().try_decode::<PrimitiveDateTime>() {
            JsonValue::String(format_datetime(dt)?)
         } else if let Ok(v) = value.to_owned().try_decode::<String>() {
            JsonValue::String(v)
         } else {
            JsonValue::Null
         }
      }

      "BLOB" => value
         .to_owned()
         .try_decode::<Vec<u8>>()
         .map_or(JsonValue::Null, |blob| JsonValue::String(base64_encode(&blob))),

      "NULL" => JsonValue::Null,

      _ => {
         // For unknown types, try to decode as text
         if let Ok(text) = value.to_owned().try_decode::<String>() {
            JsonValue::String(text)
         } else {
            return Err(Error::UnsupportedDatatype(format!(
               "Unknown SQLite type: {}",
               column_type.name()
            )));
         }
      }
   };

   Ok(result)
}

/// Convert a MySQL value to a JSON value.
///
/// Values come out shaped like their SQLite counterparts: booleans as 0/1 integers,
/// timestamps as `YYYY-MM-DD HH:MM:SS` strings and binary data as base64.
pub fn mysql_to_json(value: MySqlValueRef) -> Result<JsonValue, Error> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let type_name = value.type_info().name().to_string();
   let value = ValueRef::to_owned(&value);

   let result = match type_name.as_str() {
      "BOOLEAN" => value
         .try_decode::<bool>()
         .map_or(JsonValue::Null, |v| JsonValue::from(i64::from(v))),

      "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
      | "BIGINT UNSIGNED" => value
         .try_decode::<u64>()
         .map_or(JsonValue::Null, JsonValue::from),

      "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => value
         .try_decode::<i64>()
         .map_or(JsonValue::Null, JsonValue::from),

      "YEAR" => value
         .try_decode_unchecked::<u16>()
         .map_or(JsonValue::Null, JsonValue::from),

      "FLOAT" => value
         .try_decode::<f32>()
         .map_or(JsonValue::Null, |v| JsonValue::from(f64::from(v))),

      "DOUBLE" => value
         .try_decode::<f64>()
         .map_or(JsonValue::Null, JsonValue::from),

      // DECIMAL arrives as its exact decimal text in both protocols
      "DECIMAL" => value
         .try_decode_unchecked::<String>()
         .ok()
         .and_then(|text| text.parse::<f64>().ok())
         .map_or(JsonValue::Null, JsonValue::from),

      "DATE" => {
         let date = value.try_decode::<Date>()?;
         JsonValue::String(format_with(date.format(DATE_FORMAT))?)
      }

      "TIME" => {
         let t = value.try_decode::<time::Time>()?;
         JsonValue::String(format_with(t.format(TIME_FORMAT))?)
      }

      "DATETIME" => JsonValue::String(format_datetime(value.try_decode::<PrimitiveDateTime>()?)?),

      "TIMESTAMP" => {
         let ts = value.try_decode::<OffsetDateTime>()?;
         JsonValue::String(format_with(ts.format(DATETIME_FORMAT))?)
      }

      "JSON" => value
         .try_decode::<JsonValue>()
         .unwrap_or(JsonValue::Null),

      "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => value
         .try_decode::<String>()
         .map_or(JsonValue::Null, JsonValue::String),

      "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => value
         .try_decode::<Vec<u8>>()
         .map_or(JsonValue::Null, |blob| JsonValue::String(base64_encode(&blob))),

      "NULL" => JsonValue::Null,

      other => {
         if let Ok(text) = value.try_decode_unchecked::<String>() {
            JsonValue::String(text)
         } else {
            return Err(Error::UnsupportedDatatype(format!(
               "Unknown MySQL type: {}",
               other
            )));
         }
      }
   };

   Ok(result)
}

/// Decode SQLite rows into JSON maps.
pub fn decode_sqlite_rows(rows: Vec<SqliteRow>) -> Result<Vec<JsonRow>, Error> {
   let mut values = Vec::with_capacity(rows.len());
   for row in rows {
      let mut value = IndexMap::default();
      for (i, column) in row.columns().iter().enumerate() {
         let v = row.try_get_raw(i)?;
         value.insert(column.name().to_string(), sqlite_to_json(v)?);
      }
      values.push(value);
   }
   Ok(values)
}

/// Decode MySQL rows into JSON maps.
pub fn decode_mysql_rows(rows: Vec<MySqlRow>) -> Result<Vec<JsonRow>, Error> {
   let mut values = Vec::with_capacity(rows.len());
   for row in rows {
      let mut value = IndexMap::default();
      for (i, column) in row.columns().iter().enumerate() {
         let v = row.try_get_raw(i)?;
         value.insert(column.name().to_string(), mysql_to_json(v)?);
      }
      values.push(value);
   }
   Ok(values)
}

fn format_datetime(dt: PrimitiveDateTime) -> Result<String, Error> {
   format_with(dt.format(DATETIME_FORMAT))
}

fn format_with(formatted: Result<String, time::error::Format>) -> Result<String, Error> {
   formatted.map_err(|e| Error::Other(format!("failed to format temporal value: {e}")))
}

/// Base64 encode binary data for JSON serialization.
fn base64_encode(data: &[u8]) -> String {
   use base64::Engine;
   base64::engine::general_purpose::STANDARD.encode(data)
}
