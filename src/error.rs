use serde::{Serialize, Serializer};

/// Result type alias for database-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for request handlers.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for the outfit database core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from the adapter layer, including constraint violations.
   #[error(transparent)]
   Toolkit(#[from] outfit_toolkit::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] outfit_conn_mgr::Error),

   /// MySQL was selected but no connection URL was configured.
   #[error("DATABASE_URL is required when DATABASE_TYPE is mysql")]
   MissingDatabaseUrl,

   /// `DATABASE_TYPE` names a backend that does not exist.
   #[error("unknown database type: {0} (expected sqlite, mysql or mariadb)")]
   UnknownDatabaseType(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for request handlers.
   pub fn error_code(&self) -> String {
      match self {
         Error::Toolkit(e) => e.error_code(),
         Error::ConnectionManager(e) => match e {
            outfit_conn_mgr::Error::InvalidUrl(_) => "INVALID_DATABASE_URL".to_string(),
            outfit_conn_mgr::Error::DatabaseClosed => "DATABASE_CLOSED".to_string(),
            e if e.is_pool_timeout() => "POOL_TIMED_OUT".to_string(),
            _ => "CONNECTION_ERROR".to_string(),
         },
         Error::MissingDatabaseUrl => "MISSING_DATABASE_URL".to_string(),
         Error::UnknownDatabaseType(_) => "UNKNOWN_DATABASE_TYPE".to_string(),
      }
   }

   /// See [`outfit_toolkit::Error::constraint_violation`].
   pub fn constraint_violation(&self) -> Option<outfit_toolkit::ConstraintKind> {
      match self {
         Error::Toolkit(e) => e.constraint_violation(),
         _ => None,
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}
