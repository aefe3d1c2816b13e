//! Error model shared by the store, the access policy and the management surface.
//! Every store failure is returned as-is to the caller; nothing here retries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AclError {
    /// A required field was empty, unparseable, or a management call was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An expected row was absent. Only strict removals report this.
    #[error("not found: {0}")]
    NotFound(String),
    /// The engine rejected a statement or the pool could not hand out a connection.
    #[error("storage unavailable: {context}")]
    StorageUnavailable {
        context: String,
        #[source]
        source: sqlx::Error,
    },
    /// A statement inside a multi-step transaction failed; the transaction was rolled back.
    #[error("transaction aborted: {context}")]
    TransactionAborted {
        context: String,
        #[source]
        source: sqlx::Error,
    },
}

pub type AclResult<T> = Result<T, AclError>;

impl From<sqlx::Error> for AclError {
    fn from(source: sqlx::Error) -> Self {
        AclError::StorageUnavailable { context: "database error".to_string(), source }
    }
}

impl AclError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self { AclError::InvalidArgument(msg.into()) }
    pub fn not_found<S: Into<String>>(msg: S) -> Self { AclError::NotFound(msg.into()) }

    /// `map_err` adapter for single statements: `.map_err(AclError::storage("list banned pubkeys"))`.
    pub fn storage<S: Into<String>>(context: S) -> impl FnOnce(sqlx::Error) -> AclError {
        let context = context.into();
        move |source| AclError::StorageUnavailable { context, source }
    }

    pub fn aborted<S: Into<String>>(context: S, source: sqlx::Error) -> Self {
        AclError::TransactionAborted { context: context.into(), source }
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            AclError::InvalidArgument(_) => "invalid_argument",
            AclError::NotFound(_) => "not_found",
            AclError::StorageUnavailable { .. } => "storage_unavailable",
            AclError::TransactionAborted { .. } => "transaction_aborted",
        }
    }

    /// Map to HTTP status code for the management endpoint.
    pub fn http_status(&self) -> u16 {
        match self {
            AclError::InvalidArgument(_) => 400,
            AclError::NotFound(_) => 404,
            AclError::StorageUnavailable { .. } => 503,
            AclError::TransactionAborted { .. } => 500,
        }
    }

    /// True when the failure came from the backing engine rather than the caller's input.
    pub fn is_storage(&self) -> bool {
        matches!(self, AclError::StorageUnavailable { .. } | AclError::TransactionAborted { .. })
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
