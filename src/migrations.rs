//! Forward migrations for databases created by earlier releases.
//!
//! Category assignment went through three layouts: a free-text `clothing_items.category`,
//! then an integer foreign key into `clothing_categories`, then a many-to-many join table
//! with the foreign key kept as the item's primary category. Every step probes the live
//! schema first and skips when there is nothing to do, so the sequence is safe to run
//! against any of those layouts and safe to run twice.

use outfit_toolkit::{Adapter, Dialect, Executor};
use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crate::Result;
use crate::report::{MigrationStatus, MigrationStep, SchemaReport};

/// System categories every user gets, in display order.
pub const DEFAULT_CATEGORIES: [&str; 5] = ["上装", "外套", "下装", "鞋子", "未分类"];

/// Run every step in order. A failing step is recorded and the next one still runs.
pub async fn run_all(db: &Adapter) -> SchemaReport {
   let mut report = SchemaReport::new();
   for step in MigrationStep::ALL {
      let status = match run_step(db, step).await {
         Ok(status) => status,
         Err(e) => MigrationStatus::Failed(e.to_string()),
      };
      report.record(step, status);
   }
   report
}

pub async fn run_step(db: &Adapter, step: MigrationStep) -> Result<MigrationStatus> {
   debug!("Running migration {}", step);
   match step {
      MigrationStep::SystemFlagColumn => add_system_flag_column(db).await,
      MigrationStep::SeedSystemCategories => seed_system_categories(db).await,
      MigrationStep::CategoryToId => migrate_category_to_id(db).await,
      MigrationStep::CategoryJoinBackfill => backfill_category_join(db).await,
   }
}

async fn add_system_flag_column(db: &Adapter) -> Result<MigrationStatus> {
   if !table_exists(db, "clothing_categories").await? {
      return Ok(MigrationStatus::Skipped(
         "clothing_categories does not exist".into(),
      ));
   }
   if column_type(db, "clothing_categories", "is_system")
      .await?
      .is_some()
   {
      return Ok(MigrationStatus::Skipped("is_system already present".into()));
   }

   let column = match db.dialect() {
      Dialect::Sqlite => "INTEGER NOT NULL DEFAULT 0",
      Dialect::MySql => "TINYINT(1) NOT NULL DEFAULT 0",
   };
   db.exec(
      &format!("ALTER TABLE clothing_categories ADD COLUMN is_system {column}"),
      vec![],
   )
   .await?;

   Ok(MigrationStatus::Applied(
      "added clothing_categories.is_system".into(),
   ))
}

async fn seed_system_categories(db: &Adapter) -> Result<MigrationStatus> {
   if !table_exists(db, "clothing_categories").await? {
      return Ok(MigrationStatus::Skipped(
         "clothing_categories does not exist".into(),
      ));
   }
   if column_type(db, "clothing_categories", "is_system")
      .await?
      .is_none()
   {
      return Ok(MigrationStatus::Skipped("is_system column missing".into()));
   }

   // UNIQUE(user_id, name) turns repeats into no-ops
   let sql = format!(
      "{} clothing_categories (user_id, name, is_system) SELECT id, ?, 1 FROM users",
      db.dialect().insert_ignore()
   );

   let inserted = db
      .transaction(move |tx| {
         Box::pin(async move {
            let mut inserted = 0;
            for name in DEFAULT_CATEGORIES {
               inserted += tx.execute(&sql, vec![json!(name)]).await?.rows_affected;
            }
            Ok(inserted)
         })
      })
      .await?;

   if inserted == 0 {
      Ok(MigrationStatus::Skipped("every user already seeded".into()))
   } else {
      Ok(MigrationStatus::Applied(format!(
         "inserted {inserted} system categories"
      )))
   }
}

/// Replacement table with an integer `category`. Its indexes are created after the rename
/// because SQLite index names are global to the database.
const SQLITE_ITEMS_REBUILD: &str = r#"
CREATE TABLE clothing_items_new (
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
)
"#;

const SQLITE_ITEMS_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_clothing_items_user_id ON clothing_items(user_id);
CREATE INDEX IF NOT EXISTS idx_clothing_items_category ON clothing_items(category);
";

const MYSQL_ITEMS_REBUILD: &str = r#"
CREATE TABLE clothing_items_new (
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
)
"#;

/// Unmatched category names become 0, which references no category.
const COPY_ITEMS: &str = "
INSERT INTO clothing_items_new (
   id, user_id, category, name, description, image_path,
   price, purchase_date, created_at, updated_at
)
SELECT
   ci.id, ci.user_id, COALESCE(cc.id, 0), ci.name, ci.description, ci.image_path,
   ci.price, ci.purchase_date, ci.created_at, ci.updated_at
FROM clothing_items ci
LEFT JOIN clothing_categories cc
   ON cc.name = ci.category AND cc.user_id = ci.user_id
";

async fn migrate_category_to_id(db: &Adapter) -> Result<MigrationStatus> {
   let dialect = db.dialect();
   let Some(category_type) = column_type(db, "clothing_items", "category").await? else {
      return Ok(MigrationStatus::Skipped(
         "clothing_items.category does not exist".into(),
      ));
   };
   if dialect.is_integer_type(&category_type) {
      return Ok(MigrationStatus::Skipped(
         "clothing_items.category is already an id".into(),
      ));
   }

   debug!(
      "clothing_items.category is {:?}, rebuilding table",
      category_type
   );

   // Dropping the old table must neither cascade into outfit_items and
   // clothing_item_categories nor be refused by them. MySQL commits implicitly at each
   // DDL statement, so there the rebuild is not atomic.
   let copied = db
      .transaction_unchecked(move |tx| {
         Box::pin(async move {
            tx.execute_batch("DROP TABLE IF EXISTS clothing_items_new")
               .await?;
            tx.execute_batch(match dialect {
               Dialect::Sqlite => SQLITE_ITEMS_REBUILD,
               Dialect::MySql => MYSQL_ITEMS_REBUILD,
            })
            .await?;

            let copied = tx.execute(COPY_ITEMS, vec![]).await?.rows_affected;

            tx.execute_batch("DROP TABLE clothing_items").await?;
            tx.execute_batch("ALTER TABLE clothing_items_new RENAME TO clothing_items")
               .await?;
            if dialect == Dialect::Sqlite {
               tx.execute_batch(SQLITE_ITEMS_INDEXES).await?;
            }
            Ok(copied)
         })
      })
      .await?;

   Ok(MigrationStatus::Applied(format!(
      "rebuilt clothing_items with integer category, {copied} rows copied"
   )))
}

async fn backfill_category_join(db: &Adapter) -> Result<MigrationStatus> {
   if !table_exists(db, "clothing_item_categories").await? {
      return Ok(MigrationStatus::Skipped(
         "clothing_item_categories does not exist".into(),
      ));
   }
   match column_type(db, "clothing_items", "category").await? {
      Some(t) if db.dialect().is_integer_type(&t) => {}
      _ => {
         return Ok(MigrationStatus::Skipped(
            "clothing_items.category is not an id".into(),
         ));
      }
   }

   // Only items without any join rows, and only primary categories that exist
   let sql = format!(
      "{} clothing_item_categories (clothing_item_id, category_id)
       SELECT ci.id, ci.category
       FROM clothing_items ci
       JOIN clothing_categories cc ON cc.id = ci.category
       WHERE NOT EXISTS (
          SELECT 1 FROM clothing_item_categories cic WHERE cic.clothing_item_id = ci.id
       )",
      db.dialect().insert_ignore()
   );
   let linked = db.execute(&sql, vec![]).await?.rows_affected;

   if linked == 0 {
      Ok(MigrationStatus::Skipped(
         "every item already has a category link".into(),
      ))
   } else {
      Ok(MigrationStatus::Applied(format!(
         "linked {linked} items to their primary category"
      )))
   }
}

pub async fn table_exists<E>(db: &E, table: &str) -> Result<bool>
where
   E: Executor + ?Sized,
{
   let row = db
      .fetch_optional(db.dialect().table_exists_sql(), vec![json!(table)])
      .await?;
   Ok(row.is_some())
}

/// Declared type of `table.column`, or `None` when the table or column is missing.
pub async fn column_type<E>(db: &E, table: &str, column: &str) -> Result<Option<String>>
where
   E: Executor + ?Sized,
{
   let row = db
      .fetch_optional(
         db.dialect().column_type_sql(),
         vec![json!(table), json!(column)],
      )
      .await?;

   Ok(row.map(|mut row| match row.shift_remove("column_type") {
      Some(JsonValue::String(t)) => t,
      _ => String::new(),
   }))
}
