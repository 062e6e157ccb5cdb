//! Base table definitions and schema initialization.

use outfit_toolkit::{Adapter, Dialect, Executor};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::Result;
use crate::migrations;
use crate::report::SchemaReport;

/// SQLite base schema. Indexes are separate statements because SQLite has no inline `INDEX`.
pub const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
   id INTEGER PRIMARY KEY AUTOINCREMENT,
   email TEXT NOT NULL UNIQUE,
   password_hash TEXT NOT NULL,
   created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
   updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS sessions (
   id TEXT PRIMARY KEY,
   user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
   expires_at DATETIME NOT NULL,
   created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS clothing_categories (
   id INTEGER PRIMARY KEY AUTOINCREMENT,
   user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
   name TEXT NOT NULL,
   is_system INTEGER NOT NULL DEFAULT 0,
   created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
   updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
   UNIQUE(user_id, name)
);

CREATE TABLE IF NOT EXISTS clothing_items (
   id INTEGER PRIMARY KEY AUTOINCREMENT,
   user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
   category INTEGER NOT NULL REFERENCES clothing_categories(id) ON DELETE CASCADE,
   name TEXT NOT NULL,
   description TEXT,
   image_path TEXT NOT NULL,
   price DECIMAL(10, 2),
   purchase_date DATE,
   created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
   updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
   UNIQUE(user_id, name)
);

CREATE TABLE IF NOT EXISTS clothing_item_categories (
   clothing_item_id INTEGER NOT NULL REFERENCES clothing_items(id) ON DELETE CASCADE,
   category_id INTEGER NOT NULL REFERENCES clothing_categories(id) ON DELETE CASCADE,
   PRIMARY KEY (clothing_item_id, category_id)
);

CREATE TABLE IF NOT EXISTS outfits (
   id INTEGER PRIMARY KEY AUTOINCREMENT,
   user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
   name TEXT NOT NULL,
   description TEXT,
   created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
   updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS outfit_items (
   outfit_id INTEGER NOT NULL REFERENCES outfits(id) ON DELETE CASCADE,
   clothing_id INTEGER NOT NULL REFERENCES clothing_items(id) ON DELETE CASCADE,
   PRIMARY KEY (outfit_id, clothing_id)
);

CREATE TABLE IF NOT EXISTS outfit_calendar (
   user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
   outfit_id INTEGER NOT NULL REFERENCES outfits(id) ON DELETE CASCADE,
   date DATE NOT NULL,
   created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
   PRIMARY KEY (user_id, date, outfit_id)
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS idx_clothing_categories_user_id ON clothing_categories(user_id);
CREATE INDEX IF NOT EXISTS idx_clothing_items_user_id ON clothing_items(user_id);
CREATE INDEX IF NOT EXISTS idx_clothing_items_category ON clothing_items(category);
CREATE INDEX IF NOT EXISTS idx_clothing_item_categories_category_id ON clothing_item_categories(category_id);
CREATE INDEX IF NOT EXISTS idx_clothing_item_categories_item_id ON clothing_item_categories(clothing_item_id);
CREATE INDEX IF NOT EXISTS idx_outfits_user_id ON outfits(user_id);
CREATE INDEX IF NOT EXISTS idx_outfit_calendar_user_date ON outfit_calendar(user_id, date);
CREATE INDEX IF NOT EXISTS idx_outfit_calendar_outfit_id ON outfit_calendar(outfit_id);
"#;

/// MySQL/MariaDB base schema.
///
/// Foreign keys are table constraints: InnoDB parses and then ignores `REFERENCES` written
/// on a column definition.
pub const MYSQL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
   id INT AUTO_INCREMENT PRIMARY KEY,
   email VARCHAR(255) NOT NULL UNIQUE,
   password_hash VARCHAR(255) NOT NULL,
   created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS sessions (
   id VARCHAR(255) PRIMARY KEY,
   user_id INT NOT NULL,
   expires_at TIMESTAMP NOT NULL,
   created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   INDEX idx_sessions_user_id (user_id),
   INDEX idx_sessions_expires_at (expires_at),
   FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS clothing_categories (
   id INT AUTO_INCREMENT PRIMARY KEY,
   user_id INT NOT NULL,
   name VARCHAR(255) NOT NULL,
   is_system TINYINT(1) NOT NULL DEFAULT 0,
   created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   UNIQUE(user_id, name),
   INDEX idx_clothing_categories_user_id (user_id),
   FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS clothing_items (
   id INT AUTO_INCREMENT PRIMARY KEY,
   user_id INT NOT NULL,
   category INT NOT NULL,
   name VARCHAR(255) NOT NULL,
   description TEXT,
   image_path VARCHAR(255) NOT NULL,
   price DECIMAL(10, 2),
   purchase_date DATE,
   created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   UNIQUE(user_id, name),
   INDEX idx_clothing_items_user_id (user_id),
   INDEX idx_clothing_items_category (category),
   FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
   FOREIGN KEY (category) REFERENCES clothing_categories(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS clothing_item_categories (
   clothing_item_id INT NOT NULL,
   category_id INT NOT NULL,
   PRIMARY KEY (clothing_item_id, category_id),
   INDEX idx_clothing_item_categories_category_id (category_id),
   INDEX idx_clothing_item_categories_item_id (clothing_item_id),
   FOREIGN KEY (clothing_item_id) REFERENCES clothing_items(id) ON DELETE CASCADE,
   FOREIGN KEY (category_id) REFERENCES clothing_categories(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS outfits (
   id INT AUTO_INCREMENT PRIMARY KEY,
   user_id INT NOT NULL,
   name VARCHAR(255) NOT NULL,
   description TEXT,
   created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   INDEX idx_outfits_user_id (user_id),
   FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS outfit_items (
   outfit_id INT NOT NULL,
   clothing_id INT NOT NULL,
   PRIMARY KEY (outfit_id, clothing_id),
   FOREIGN KEY (outfit_id) REFERENCES outfits(id) ON DELETE CASCADE,
   FOREIGN KEY (clothing_id) REFERENCES clothing_items(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS outfit_calendar (
   user_id INT NOT NULL,
   outfit_id INT NOT NULL,
   date DATE NOT NULL,
   created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
   PRIMARY KEY (user_id, date, outfit_id),
   INDEX idx_outfit_calendar_user_date (user_id, date),
   INDEX idx_outfit_calendar_outfit_id (outfit_id),
   FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
   FOREIGN KEY (outfit_id) REFERENCES outfits(id) ON DELETE CASCADE
);
"#;

/// Tables the base schema creates, in creation order.
pub const TABLES: [&str; 8] = [
   "users",
   "sessions",
   "clothing_categories",
   "clothing_items",
   "clothing_item_categories",
   "outfits",
   "outfit_items",
   "outfit_calendar",
];

pub fn base_schema(dialect: Dialect) -> &'static str {
   match dialect {
      Dialect::Sqlite => SQLITE_SCHEMA,
      Dialect::MySql => MYSQL_SCHEMA,
   }
}

/// Create any missing tables, then bring older layouts forward.
///
/// A failure creating the base tables is returned: nothing works without them. Migration
/// failures are only recorded in the report.
pub async fn initialize_schema(db: &Adapter) -> Result<SchemaReport> {
   let dialect = db.dialect();
   info!("Initializing {} schema", dialect);

   db.exec(base_schema(dialect), vec![]).await?;

   let report = migrations::run_all(db).await;
   if report.is_healthy() {
      info!("Schema ready");
   }
   Ok(report)
}

/// Names of all user tables in the current database, sorted.
pub async fn list_tables<E>(db: &E) -> Result<Vec<String>>
where
   E: Executor + ?Sized,
{
   let rows = db.query(db.dialect().list_tables_sql(), vec![]).await?;
   Ok(rows
      .into_iter()
      .filter_map(|mut row| match row.shift_remove("name") {
         Some(JsonValue::String(name)) => Some(name),
         _ => None,
      })
      .collect())
}
