//! SQL fragments that differ between the two backends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which SQL dialect an executor speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
   Sqlite,
   MySql,
}

impl Dialect {
   /// SQL expression for the current timestamp.
   pub fn now(self) -> &'static str {
      match self {
         Dialect::Sqlite => "datetime('now')",
         Dialect::MySql => "NOW()",
      }
   }

   /// Insert prefix that silently skips rows violating a unique key.
   pub fn insert_ignore(self) -> &'static str {
      match self {
         Dialect::Sqlite => "INSERT OR IGNORE INTO",
         Dialect::MySql => "INSERT IGNORE INTO",
      }
   }

   /// Whether `INSERT/UPDATE/DELETE ... RETURNING *` is available.
   pub fn supports_returning(self) -> bool {
      matches!(self, Dialect::Sqlite)
   }

   /// Query with one `?` parameter (the table name) returning a row if that table exists.
   pub fn table_exists_sql(self) -> &'static str {
      match self {
         Dialect::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
         Dialect::MySql => {
            "SELECT table_name AS name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?"
         }
      }
   }

   /// Query with two `?` parameters (table, column) returning one `column_type` row if the
   /// column exists.
   pub fn column_type_sql(self) -> &'static str {
      match self {
         Dialect::Sqlite => "SELECT type AS column_type FROM pragma_table_info(?) WHERE name = ?",
         Dialect::MySql => {
            "SELECT CAST(data_type AS CHAR) AS column_type FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?"
         }
      }
   }

   /// Query listing every user table as a `name` column.
   pub fn list_tables_sql(self) -> &'static str {
      match self {
         Dialect::Sqlite => {
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name"
         }
         Dialect::MySql => {
            "SELECT CAST(table_name AS CHAR) AS name FROM information_schema.tables \
             WHERE table_schema = DATABASE() ORDER BY table_name"
         }
      }
   }

   /// Whether a declared column type (as returned by [`Dialect::column_type_sql`]) is an
   /// integer type.
   pub fn is_integer_type(self, column_type: &str) -> bool {
      let column_type = column_type.trim().to_ascii_lowercase();
      match self {
         // SQLite's affinity rule: any declared type containing "INT" has integer affinity
         Dialect::Sqlite => column_type.contains("int"),
         Dialect::MySql => matches!(
            column_type.as_str(),
            "int" | "integer" | "bigint" | "smallint" | "mediumint" | "tinyint"
         ),
      }
   }
}

impl fmt::Display for Dialect {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Dialect::Sqlite => f.write_str("sqlite"),
         Dialect::MySql => f.write_str("mysql"),
      }
   }
}
