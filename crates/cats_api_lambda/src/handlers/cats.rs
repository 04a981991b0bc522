use std::time::Instant;

use cats_api_core::backend::DocumentBackend;
use cats_api_core::contract::{describe_operation, OPERATION_FIELD};
use cats_api_core::dispatch::{handle_event, DispatchError};
use serde_json::Value;
use tracing::{error, info};

use crate::config::HandlerConfig;

pub const FUNCTION_NAME: &str = "cats";

/// Handles one cats API event end to end, logging its outcome.
pub async fn handle_cats_event<B>(
    backend: &B,
    config: &HandlerConfig,
    payload: Value,
) -> Result<Value, DispatchError>
where
    B: DocumentBackend + ?Sized,
{
    if config.verbose {
        info!(
            component = "cats_handler",
            event = "event_received",
            payload = %payload,
            "Received event"
        );
    }

    let operation = describe_operation(payload.get(OPERATION_FIELD));
    let started_at = Instant::now();
    let result = handle_event(backend, payload).await;
    let duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);

    match &result {
        Ok(_) => info!(
            component = "cats_handler",
            event = "operation_completed",
            operation = %operation,
            duration_ms,
        ),
        Err(dispatch_error) => error!(
            component = "cats_handler",
            event = "operation_failed",
            operation = %operation,
            duration_ms,
            error = %dispatch_error,
        ),
    }
    result
}
