use async_trait::async_trait;
use thiserror::Error;

use crate::contract::{
    DeleteItemParams, GetItemOutput, GetItemParams, PutItemParams, ScanOutput, ScanParams,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Requested resource not found: table '{table}' does not exist")]
    TableNotFound { table: String },

    #[error("The conditional request failed")]
    ConditionalCheckFailed,

    #[error("One or more parameter values were invalid: {message}")]
    Validation { message: String },

    #[error("document store request failed: {message}")]
    Service { message: String },
}

impl BackendError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }
}

/// The managed table the dispatcher proxies onto.
///
/// Method names follow the document-client vocabulary: `create` and `update`
/// both map to `put`, and `list` maps to `scan`.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn put(&self, params: PutItemParams) -> Result<(), BackendError>;

    async fn get(&self, params: GetItemParams) -> Result<GetItemOutput, BackendError>;

    async fn delete(&self, params: DeleteItemParams) -> Result<(), BackendError>;

    async fn scan(&self, params: ScanParams) -> Result<ScanOutput, BackendError>;
}
