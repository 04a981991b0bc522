use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::backend::{BackendError, DocumentBackend};
use crate::contract::{
    describe_operation, take_operation, DeleteItemParams, GetItemParams, Operation, PutItemParams,
    Request, ScanParams, PING_RESPONSE,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unrecognized operation \"{operation}\"")]
    UnrecognizedOperation { operation: String },

    #[error("Malformed {operation} request: {message}")]
    InvalidParams {
        operation: Operation,
        message: String,
    },

    #[error("Request payload must be a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Routes one request onto the backend based on its `operation` field.
///
/// The `operation` field is removed before the remaining fields are forwarded
/// or echoed. Unknown, missing, or non-string operations are rejected without
/// touching the backend, and so are table fields the backend cannot honour.
pub async fn handle_operation<B>(backend: &B, mut request: Request) -> Result<Value, DispatchError>
where
    B: DocumentBackend + ?Sized,
{
    let raw_operation = take_operation(&mut request);
    let Some(operation) = raw_operation
        .as_ref()
        .and_then(Value::as_str)
        .and_then(Operation::parse)
    else {
        return Err(DispatchError::UnrecognizedOperation {
            operation: describe_operation(raw_operation.as_ref()),
        });
    };

    match operation {
        Operation::Create | Operation::Update => {
            let params: PutItemParams = parse_params(operation, request)?;
            backend.put(params).await?;
            Ok(Value::Object(Map::new()))
        }
        Operation::Get => {
            let params: GetItemParams = parse_params(operation, request)?;
            Ok(backend.get(params).await?.into())
        }
        Operation::Delete => {
            let params: DeleteItemParams = parse_params(operation, request)?;
            backend.delete(params).await?;
            Ok(Value::Object(Map::new()))
        }
        Operation::List => {
            let params: ScanParams = parse_params(operation, request)?;
            Ok(backend.scan(params).await?.into())
        }
        Operation::Echo => Ok(Value::Object(request)),
        Operation::Ping => Ok(Value::String(PING_RESPONSE.to_string())),
    }
}

/// Entry point for raw events whose shape has not been checked yet.
pub async fn handle_event<B>(backend: &B, event: Value) -> Result<Value, DispatchError>
where
    B: DocumentBackend + ?Sized,
{
    match event {
        Value::Object(request) => handle_operation(backend, request).await,
        _ => Err(DispatchError::NotAnObject),
    }
}

fn parse_params<T: DeserializeOwned>(
    operation: Operation,
    request: Request,
) -> Result<T, DispatchError> {
    serde_json::from_value(Value::Object(request)).map_err(|error| DispatchError::InvalidParams {
        operation,
        message: error.to_string(),
    })
}
