use std::time::Duration;

use outfit_toolkit::{Adapter, ConstraintKind, Dialect, Error, Executor, SqliteAdapter};
use serde_json::json;
use tempfile::TempDir;

async fn create_test_db() -> (Adapter, TempDir) {
   let temp_dir = TempDir::new().expect("Failed to create temp directory");
   let db_path = temp_dir.path().join("test.db");
   let adapter = SqliteAdapter::connect(&db_path, None)
      .await
      .expect("Failed to connect to test database");

   (adapter.into(), temp_dir)
}

async fn create_items_table(db: &Adapter) {
   db.exec(
      "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, email TEXT NOT NULL UNIQUE);
       CREATE TABLE items (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
          name TEXT NOT NULL
       );",
      vec![],
   )
   .await
   .unwrap();
}

async fn count(db: &impl Executor, table: &str) -> i64 {
   let rows = db
      .query(&format!("SELECT COUNT(*) AS n FROM {table}"), vec![])
      .await
      .unwrap();
   rows[0]["n"].as_i64().unwrap()
}

#[tokio::test]
async fn test_exec_batch_and_query() {
   let (db, _temp) = create_test_db().await;
   assert_eq!(db.dialect(), Dialect::Sqlite);

   // The first statement's literal contains a semicolon
   db.exec(
      "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);
       INSERT INTO notes (body) VALUES ('wash; then iron');
       INSERT INTO notes (body) VALUES ('hang dry');",
      vec![],
   )
   .await
   .unwrap();

   let rows = db
      .query("SELECT id, body FROM notes ORDER BY id", vec![])
      .await
      .unwrap();

   assert_eq!(rows.len(), 2);
   assert_eq!(rows[0]["id"], json!(1));
   assert_eq!(rows[0]["body"], json!("wash; then iron"));
   assert_eq!(rows[1]["body"], json!("hang dry"));

   // Column order follows the select list
   let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
   assert_eq!(keys, vec!["id", "body"]);
}

#[tokio::test]
async fn test_exec_with_parameters() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   db.exec(
      "INSERT INTO users (email) VALUES (?)",
      vec![json!("alice@example.com")],
   )
   .await
   .unwrap();

   let rows = db
      .query(
         "SELECT email FROM users WHERE email = ?",
         vec![json!("alice@example.com")],
      )
      .await
      .unwrap();
   assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_value_decoding() {
   let (db, _temp) = create_test_db().await;

   db.exec(
      "CREATE TABLE v (i INTEGER, r REAL, t TEXT, b BLOB, n TEXT, flag BOOLEAN)",
      vec![],
   )
   .await
   .unwrap();

   db.exec(
      "INSERT INTO v (i, r, t, b, n, flag) VALUES (?, ?, ?, X'68656C6C6F', ?, ?)",
      vec![json!(42), json!(2.5), json!("外套"), json!(null), json!(true)],
   )
   .await
   .unwrap();

   let row = db
      .prepare("SELECT * FROM v")
      .get(vec![])
      .await
      .unwrap()
      .unwrap();

   assert_eq!(row["i"], json!(42));
   assert_eq!(row["r"], json!(2.5));
   assert_eq!(row["t"], json!("外套"));
   assert_eq!(row["b"], json!("aGVsbG8="));
   assert_eq!(row["n"], json!(null));
   assert_eq!(row["flag"], json!(1));
}

#[tokio::test]
async fn test_statement_reuse() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   let insert = db.prepare("INSERT INTO users (email) VALUES (?)");
   let first = insert.run(vec![json!("a@example.com")]).await.unwrap();
   let second = insert.run(vec![json!("b@example.com")]).await.unwrap();

   assert_eq!((first.rows_affected, first.last_insert_id), (1, Some(1)));
   assert_eq!((second.rows_affected, second.last_insert_id), (1, Some(2)));

   let by_email = db.prepare("SELECT id FROM users WHERE email = ?");
   assert_eq!(
      by_email.get(vec![json!("b@example.com")]).await.unwrap().unwrap()["id"],
      json!(2)
   );
   assert!(by_email.get(vec![json!("nobody@example.com")]).await.unwrap().is_none());
   assert_eq!(by_email.all(vec![json!("a@example.com")]).await.unwrap().len(), 1);
   assert_eq!(by_email.sql(), "SELECT id FROM users WHERE email = ?");
}

#[tokio::test]
async fn test_update_reports_rows_affected_without_insert_id() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   db.exec("INSERT INTO users (email) VALUES ('a@x'), ('b@x')", vec![])
      .await
      .unwrap();

   let result = db
      .prepare("UPDATE users SET email = email || '.org'")
      .run(vec![])
      .await
      .unwrap();
   assert_eq!(result.rows_affected, 2);
}

#[tokio::test]
async fn test_returning_through_all() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   let rows = db
      .prepare("INSERT INTO users (email) VALUES (?) RETURNING id, email")
      .all(vec![json!("c@example.com")])
      .await
      .unwrap();

   assert_eq!(rows.len(), 1);
   assert_eq!(rows[0]["email"], json!("c@example.com"));
   assert_eq!(count(&db, "users").await, 1);
}

#[tokio::test]
async fn test_transaction_commits() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   let user_id = db
      .transaction(|tx| {
         Box::pin(async move {
            let result = tx
               .execute("INSERT INTO users (email) VALUES (?)", vec![json!("t@x")])
               .await?;
            let user_id = result.last_insert_id.unwrap_or_default();
            tx.execute(
               "INSERT INTO items (user_id, name) VALUES (?, ?)",
               vec![json!(user_id), json!("scarf")],
            )
            .await?;

            // Uncommitted rows are visible inside the transaction
            let rows = tx.query("SELECT COUNT(*) AS n FROM items", vec![]).await?;
            assert_eq!(rows[0]["n"], json!(1));

            Ok(user_id)
         })
      })
      .await
      .unwrap();

   assert_eq!(user_id, 1);
   assert_eq!(count(&db, "users").await, 1);
   assert_eq!(count(&db, "items").await, 1);
}

#[tokio::test]
async fn test_transaction_rolls_back_all_inserts_on_error() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   let result: Result<(), Error> = db
      .transaction(|tx| {
         Box::pin(async move {
            for n in 0..5 {
               tx.execute(
                  "INSERT INTO users (email) VALUES (?)",
                  vec![json!(format!("user{n}@x"))],
               )
               .await?;
            }
            Err(Error::Other("abort after five inserts".into()))
         })
      })
      .await;

   assert!(matches!(result, Err(Error::Other(ref m)) if m == "abort after five inserts"));
   assert_eq!(count(&db, "users").await, 0);

   // The writer is usable again afterwards
   db.exec("INSERT INTO users (email) VALUES ('after@x')", vec![])
      .await
      .unwrap();
   assert_eq!(count(&db, "users").await, 1);
}

#[tokio::test]
async fn test_transaction_rolls_back_on_constraint_violation() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   let err = db
      .transaction(|tx| {
         Box::pin(async move {
            tx.execute("INSERT INTO users (email) VALUES ('dup@x')", vec![])
               .await?;
            tx.execute("INSERT INTO users (email) VALUES ('dup@x')", vec![])
               .await?;
            Ok(())
         })
      })
      .await
      .unwrap_err();

   assert_eq!(err.constraint_violation(), Some(ConstraintKind::Unique));
   assert_eq!(count(&db, "users").await, 0);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   let err = db
      .exec(
         "INSERT INTO items (user_id, name) VALUES (?, ?)",
         vec![json!(999), json!("orphan")],
      )
      .await
      .unwrap_err();
   assert_eq!(err.constraint_violation(), Some(ConstraintKind::ForeignKey));
}

#[tokio::test]
async fn test_transaction_unchecked_suspends_foreign_keys() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   db.transaction_unchecked(|tx| {
      Box::pin(async move {
         tx.execute(
            "INSERT INTO items (user_id, name) VALUES (?, ?)",
            vec![json!(999), json!("orphan")],
         )
         .await?;
         tx.execute("DELETE FROM items", vec![]).await?;
         Ok(())
      })
   })
   .await
   .unwrap();

   // Enforcement is back once the transaction ends
   let err = db
      .exec(
         "INSERT INTO items (user_id, name) VALUES (?, ?)",
         vec![json!(999), json!("orphan")],
      )
      .await
      .unwrap_err();
   assert_eq!(err.constraint_violation(), Some(ConstraintKind::ForeignKey));
}

#[tokio::test]
async fn test_cancelled_transaction_does_not_swallow_later_writes() {
   let (db, temp) = create_test_db().await;
   create_items_table(&db).await;
   db.exec("INSERT INTO users (id, email) VALUES (1, 'a@x')", vec![])
      .await
      .unwrap();

   let abandoned = tokio::time::timeout(
      Duration::from_millis(200),
      db.transaction(|tx| {
         Box::pin(async move {
            tx.execute("INSERT INTO users (email) VALUES ('pending@x')", vec![])
               .await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
         })
      }),
   )
   .await;
   assert!(abandoned.is_err(), "transaction should have timed out");

   db.exec("INSERT INTO users (email) VALUES ('later@x')", vec![])
      .await
      .unwrap();

   // The writer is usable for new transactions again
   db.transaction(|tx| {
      Box::pin(async move {
         tx.execute("INSERT INTO users (email) VALUES ('after@x')", vec![])
            .await?;
         Ok(())
      })
   })
   .await
   .unwrap();

   db.close().await.unwrap();
   let reopened: Adapter = SqliteAdapter::connect(temp.path().join("test.db"), None)
      .await
      .unwrap()
      .into();
   let rows = reopened
      .query("SELECT email FROM users ORDER BY id", vec![])
      .await
      .unwrap();
   let emails: Vec<&str> = rows.iter().map(|r| r["email"].as_str().unwrap()).collect();
   assert_eq!(emails, vec!["a@x", "later@x", "after@x"]);
}

#[tokio::test]
async fn test_cancelled_unchecked_transaction_leaves_foreign_keys_on() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   let abandoned = tokio::time::timeout(
      Duration::from_millis(200),
      db.transaction_unchecked(|_tx| {
         Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
         })
      }),
   )
   .await;
   assert!(abandoned.is_err());

   let err = db
      .exec(
         "INSERT INTO items (user_id, name) VALUES (?, ?)",
         vec![json!(999), json!("orphan")],
      )
      .await
      .unwrap_err();
   assert_eq!(err.constraint_violation(), Some(ConstraintKind::ForeignKey));
}

#[tokio::test]
async fn test_cascade_delete() {
   let (db, _temp) = create_test_db().await;
   create_items_table(&db).await;

   db.exec("INSERT INTO users (id, email) VALUES (1, 'a@x')", vec![])
      .await
      .unwrap();
   db.exec(
      "INSERT INTO items (user_id, name) VALUES (1, 'coat'), (1, 'boots')",
      vec![],
   )
   .await
   .unwrap();

   db.exec("DELETE FROM users WHERE id = ?", vec![json!(1)])
      .await
      .unwrap();
   assert_eq!(count(&db, "items").await, 0);
}

#[tokio::test]
async fn test_close_is_idempotent_and_final() {
   let (db, _temp) = create_test_db().await;

   db.close().await.unwrap();
   db.close().await.unwrap();
   assert!(db.is_closed());

   let err = db.query("SELECT 1", vec![]).await.unwrap_err();
   assert_eq!(err.error_code(), "DATABASE_CLOSED");

   let err = db.exec("CREATE TABLE t (id INTEGER)", vec![]).await.unwrap_err();
   assert_eq!(err.error_code(), "DATABASE_CLOSED");
}

#[tokio::test]
async fn test_memory_database() {
   let db: Adapter = SqliteAdapter::connect(":memory:", None)
      .await
      .unwrap()
      .into();

   create_items_table(&db).await;
   db.exec("INSERT INTO users (email) VALUES ('m@x')", vec![])
      .await
      .unwrap();
   assert_eq!(count(&db, "users").await, 1);

   db.close().await.unwrap();
}
