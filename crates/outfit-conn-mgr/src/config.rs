//! Configuration for the backend connection pools

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pool sizes for a [`crate::SqliteDatabase`]. The writer is always a single connection.
///
/// ```
/// use outfit_conn_mgr::SqliteDatabaseConfig;
///
/// let config = SqliteDatabaseConfig {
///    max_read_connections: 2,
///    ..Default::default()
/// };
/// assert_eq!(config.idle_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteDatabaseConfig {
   /// Read-only connections serving `SELECT`s concurrently. Default: 6
   pub max_read_connections: u32,

   /// Seconds an unused connection stays open. Default: 30
   pub idle_timeout_secs: u64,
}

impl Default for SqliteDatabaseConfig {
   fn default() -> Self {
      Self {
         max_read_connections: 6,
         idle_timeout_secs: 30,
      }
   }
}

/// Configuration for the MySQL connection pool
///
/// The application runs with the defaults; the fields exist so tests can
/// shrink the pool and the timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MySqlPoolConfig {
   /// Maximum number of pooled connections
   ///
   /// Default: 10
   pub max_connections: u32,

   /// How long an operation waits for a free connection before failing (in milliseconds)
   ///
   /// Default: 30000
   pub acquire_timeout_ms: u64,
}

impl MySqlPoolConfig {
   pub fn acquire_timeout(&self) -> Duration {
      Duration::from_millis(self.acquire_timeout_ms)
   }
}

impl Default for MySqlPoolConfig {
   fn default() -> Self {
      Self {
         max_connections: 10,
         acquire_timeout_ms: 30_000,
      }
   }
}
