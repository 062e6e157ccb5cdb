//! Error types for outfit-conn-mgr

use thiserror::Error;

/// Errors that may occur when opening or using a backend connection
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors, including pool
   /// acquire timeouts, are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Database has been closed and cannot be used
   #[error("Database has been closed")]
   DatabaseClosed,

   /// The networked backend's connection URL could not be parsed
   #[error("Invalid MySQL connection URL: {0}")]
   InvalidUrl(String),
}

impl Error {
   /// Returns true if this error is a pool acquire timeout
   pub fn is_pool_timeout(&self) -> bool {
      matches!(self, Error::Sqlx(sqlx::Error::PoolTimedOut))
   }
}
