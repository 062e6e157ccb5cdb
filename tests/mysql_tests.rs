//! Needs a reachable server and a scratch database, e.g.
//! `OUTFIT_TEST_MYSQL_URL=mysql://root:pw@127.0.0.1:3306/outfit_test cargo test -- --ignored`
//!
//! Every table in that database is dropped.

use outfit_db::migrations::column_type;
use outfit_db::schema::TABLES;
use outfit_db::{Database, DbSettings, Dialect, MigrationStatus, MigrationStep, list_tables};
use outfit_toolkit::helpers::{delete_and_get, insert_and_get, update_and_get};
use outfit_toolkit::{Adapter, ConstraintKind, Executor, MySqlAdapter};
use serde_json::json;

const LEGACY_LAYOUT: &str = "
   CREATE TABLE users (
      id INT AUTO_INCREMENT PRIMARY KEY,
      email VARCHAR(255) NOT NULL UNIQUE,
      password_hash VARCHAR(255) NOT NULL,
      created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
      updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
   );
   CREATE TABLE clothing_categories (
      id INT AUTO_INCREMENT PRIMARY KEY,
      user_id INT NOT NULL,
      name VARCHAR(255) NOT NULL,
      created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
      updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
      UNIQUE(user_id, name),
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
   );
   CREATE TABLE clothing_items (
      id INT AUTO_INCREMENT PRIMARY KEY,
      user_id INT NOT NULL,
      category VARCHAR(255) NOT NULL,
      name VARCHAR(255) NOT NULL,
      description TEXT,
      image_path VARCHAR(255) NOT NULL,
      price DECIMAL(10, 2),
      purchase_date DATE,
      created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
      updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
      UNIQUE(user_id, name),
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
   );
   INSERT INTO users (id, email, password_hash) VALUES (1, 'alice@example.com', 'x');
   INSERT INTO clothing_items (id, user_id, category, name, image_path, price, purchase_date)
      VALUES (42, 1, '外套', 'wool coat', 'coat.jpg', 129.99, '2024-01-15');
";

async fn reset(db: &Adapter) {
   let mut script = String::from("SET FOREIGN_KEY_CHECKS = 0;");
   for table in list_tables(db).await.unwrap() {
      script.push_str(&format!("DROP TABLE IF EXISTS `{table}`;"));
   }
   script.push_str("SET FOREIGN_KEY_CHECKS = 1;");
   db.exec(&script, vec![]).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_mysql_migrates_legacy_layout_and_runs_helpers() {
   let Ok(url) = std::env::var("OUTFIT_TEST_MYSQL_URL") else {
      return;
   };

   let raw: Adapter = MySqlAdapter::connect(&url, None).await.unwrap().into();
   reset(&raw).await;
   raw.exec(LEGACY_LAYOUT, vec![]).await.unwrap();
   raw.close().await.unwrap();

   let db = Database::open(&DbSettings::mysql(url.clone())).await.unwrap();
   assert_eq!(db.dialect(), Dialect::MySql);
   assert!(!db.supports_returning());

   let report = db.schema_report();
   assert!(report.is_healthy(), "{report:?}");
   for step in MigrationStep::ALL {
      assert!(
         matches!(report.status_of(step), Some(MigrationStatus::Applied(_))),
         "{step} should have applied: {:?}",
         report.status_of(step)
      );
   }

   let tables = list_tables(&*db).await.unwrap();
   for table in TABLES {
      assert!(tables.iter().any(|t| t == table), "missing {table}");
   }
   assert_eq!(
      column_type(&*db, "clothing_items", "category")
         .await
         .unwrap()
         .as_deref(),
      Some("int")
   );

   let coat = db
      .query(
         "SELECT id FROM clothing_categories WHERE user_id = 1 AND name = ?",
         vec![json!("外套")],
      )
      .await
      .unwrap();
   let item = db
      .query(
         "SELECT category, price, purchase_date FROM clothing_items WHERE id = 42",
         vec![],
      )
      .await
      .unwrap();
   assert_eq!(item[0]["category"], coat[0]["id"]);
   assert_eq!(item[0]["price"], json!(129.99));
   assert_eq!(item[0]["purchase_date"], json!("2024-01-15"));

   // Second open finds nothing to do
   db.close().await.unwrap();
   let db = Database::open(&DbSettings::mysql(url)).await.unwrap();
   assert!(
      db.schema_report()
         .events()
         .iter()
         .all(|e| matches!(e.status, MigrationStatus::Skipped(_)))
   );

   // Helpers read back rows without RETURNING
   let category = insert_and_get(
      &*db,
      "clothing_categories",
      &["user_id", "name"],
      vec![json!(1), json!("衬衫")],
   )
   .await
   .unwrap();
   assert_eq!(category["name"], json!("衬衫"));
   assert_eq!(category["is_system"], json!(0));

   let err = insert_and_get(
      &*db,
      "clothing_categories",
      &["user_id", "name"],
      vec![json!(1), json!("衬衫")],
   )
   .await
   .unwrap_err();
   assert_eq!(err.constraint_violation(), Some(ConstraintKind::Unique));

   let renamed = update_and_get(
      &*db,
      "clothing_categories",
      &["name = ?"],
      vec![json!("T恤")],
      &["id = ?"],
      vec![category["id"].clone()],
   )
   .await
   .unwrap()
   .expect("category should be updated");
   assert_eq!(renamed["name"], json!("T恤"));
   assert_eq!(renamed["id"], category["id"]);

   let deleted = delete_and_get(&db, "clothing_categories", &["id = ?"], vec![category["id"].clone()])
      .await
      .unwrap()
      .expect("category should be deleted");
   assert_eq!(deleted, renamed);
   assert!(
      delete_and_get(&db, "clothing_categories", &["id = ?"], vec![category["id"].clone()])
         .await
         .unwrap()
         .is_none()
   );

   // Calendar entries are unique per user, date and outfit
   let outfit = insert_and_get(
      &*db,
      "outfits",
      &["user_id", "name"],
      vec![json!(1), json!("Monday")],
   )
   .await
   .unwrap();
   let sql = format!(
      "{} outfit_calendar (user_id, outfit_id, date) VALUES (?, ?, ?)",
      db.dialect().insert_ignore()
   );
   for _ in 0..2 {
      db.exec(&sql, vec![json!(1), outfit["id"].clone(), json!("2024-03-04")])
         .await
         .unwrap();
   }
   let rows = db
      .query("SELECT date FROM outfit_calendar", vec![])
      .await
      .unwrap();
   assert_eq!(rows.len(), 1);
   assert_eq!(rows[0]["date"], json!("2024-03-04"));

   reset(&db).await;
   db.close().await.unwrap();
}
