use std::fmt;

use serde::Serialize;
use sqlx::error::ErrorKind;

/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which integrity rule a rejected statement broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
   Unique,
   ForeignKey,
   NotNull,
   Check,
}

impl ConstraintKind {
   fn code(self) -> &'static str {
      match self {
         ConstraintKind::Unique => "CONSTRAINT_UNIQUE",
         ConstraintKind::ForeignKey => "CONSTRAINT_FOREIGN_KEY",
         ConstraintKind::NotNull => "CONSTRAINT_NOT_NULL",
         ConstraintKind::Check => "CONSTRAINT_CHECK",
      }
   }
}

impl fmt::Display for ConstraintKind {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let name = match self {
         ConstraintKind::Unique => "unique",
         ConstraintKind::ForeignKey => "foreign key",
         ConstraintKind::NotNull => "not null",
         ConstraintKind::Check => "check",
      };
      f.write_str(name)
   }
}

/// Error types for adapter operations.
///
/// Both backends report through the same variants so callers never branch on
/// which database is configured.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] outfit_conn_mgr::Error),

   /// Column type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// A write was rejected by a uniqueness, foreign-key, not-null or check rule.
   #[error("{kind} constraint violated: {message}")]
   Constraint {
      kind: ConstraintKind,
      message: String,
   },

   /// An insert reported success but the new row could not be read back.
   #[error("inserted row could not be read back from {0}")]
   RowNotReturned(String),

   /// An update or delete helper was called without a WHERE clause.
   #[error("refusing to run {0} without a WHERE clause")]
   EmptyWhereClause(&'static str),

   /// Transaction failed and rollback also failed.
   #[error("transaction failed: {transaction_error}; rollback also failed: {rollback_error}")]
   TransactionRollbackFailed {
      transaction_error: String,
      rollback_error: String,
   },

   /// Generic error for operations that don't fit other categories.
   #[error("{0}")]
   Other(String),
}

impl Error {
   /// Classify a database error as a constraint violation, if it is one.
   pub fn constraint_violation(&self) -> Option<ConstraintKind> {
      if let Error::Constraint { kind, .. } = self {
         return Some(*kind);
      }

      let db_err = match self {
         Error::Sqlx(e) => e.as_database_error()?,
         Error::ConnectionManager(outfit_conn_mgr::Error::Sqlx(e)) => e.as_database_error()?,
         _ => return None,
      };

      match db_err.kind() {
         ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
         ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
         ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
         ErrorKind::CheckViolation => Some(ConstraintKind::Check),
         _ => None,
      }
   }

   /// Rewrap a database constraint failure as [`Error::Constraint`], leaving
   /// every other error untouched.
   pub fn into_constraint(self) -> Self {
      match self.constraint_violation() {
         Some(kind) if !matches!(self, Error::Constraint { .. }) => Error::Constraint {
            kind,
            message: self.to_string(),
         },
         _ => self,
      }
   }

   /// Returns true if the pool gave up waiting for a free connection.
   pub fn is_pool_timeout(&self) -> bool {
      match self {
         Error::Sqlx(sqlx::Error::PoolTimedOut) => true,
         Error::ConnectionManager(e) => e.is_pool_timeout(),
         _ => false,
      }
   }

   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      if let Some(kind) = self.constraint_violation() {
         return kind.code().to_string();
      }

      match self {
         Error::Sqlx(e) => sqlx_error_code(e),
         Error::ConnectionManager(outfit_conn_mgr::Error::Sqlx(e)) => sqlx_error_code(e),
         Error::ConnectionManager(outfit_conn_mgr::Error::DatabaseClosed) => {
            "DATABASE_CLOSED".to_string()
         }
         Error::ConnectionManager(outfit_conn_mgr::Error::InvalidUrl(_)) => {
            "INVALID_DATABASE_URL".to_string()
         }
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::Constraint { kind, .. } => kind.code().to_string(),
         Error::RowNotReturned(_) => "ROW_NOT_RETURNED".to_string(),
         Error::EmptyWhereClause(_) => "EMPTY_WHERE_CLAUSE".to_string(),
         Error::TransactionRollbackFailed { .. } => "TRANSACTION_ROLLBACK_FAILED".to_string(),
         Error::Other(_) => "ERROR".to_string(),
      }
   }
}

fn sqlx_error_code(e: &sqlx::Error) -> String {
   if matches!(e, sqlx::Error::PoolTimedOut) {
      return "POOL_TIMED_OUT".to_string();
   }

   if let Some(db_err) = e.as_database_error()
      && let Some(code) = db_err.code()
   {
      if db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>().is_some() {
         return format!("MYSQL_{}", code);
      }
      return format!("SQLITE_{}", code);
   }

   "SQLX_ERROR".to_string()
}
