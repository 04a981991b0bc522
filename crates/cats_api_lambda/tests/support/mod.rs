#![allow(dead_code)]

use std::sync::Arc;

use cats_api_core::memory::InMemoryDocumentStore;
use cats_api_lambda::config::HandlerConfig;
use cats_api_lambda::handlers::cats::{handle_cats_event, FUNCTION_NAME};
use lambda_mock::{FunctionTable, InvocationContext, Request};
use serde_json::{json, Value};

pub const CATS_TABLE: &str = "cats";

/// A fresh in-memory `cats` table keyed by `name`.
pub fn cats_store() -> Arc<InMemoryDocumentStore> {
    Arc::new(InMemoryDocumentStore::new().with_table(CATS_TABLE, &["name"]))
}

/// Function table exposing the cats handler under its deployed name.
pub fn cats_api(store: Arc<InMemoryDocumentStore>) -> FunctionTable {
    FunctionTable::new().with(FUNCTION_NAME, move |request: Request, context: InvocationContext| {
        let store = Arc::clone(&store);
        async move {
            let outcome =
                handle_cats_event(store.as_ref(), &HandlerConfig::default(), Value::Object(request))
                    .await;
            context.done(outcome);
        }
    })
}

pub fn request(value: Value) -> Request {
    value.as_object().cloned().expect("request should be an object")
}

pub fn put_cat(operation: &str, name: &str, status: &str) -> Request {
    request(json!({
        "operation": operation,
        "TableName": CATS_TABLE,
        "Item": {"name": name, "status": status}
    }))
}

pub fn get_cat(name: &str) -> Request {
    request(json!({
        "operation": "get",
        "TableName": CATS_TABLE,
        "Key": {"name": name}
    }))
}
