#![allow(dead_code)]

use std::cell::RefCell;
use std::time::Duration;

use lambda_mock::{FunctionTable, InvocationContext, Request};
use serde_json::{json, Value};

/// Functions shared by the batch suites.
///
/// `echo` succeeds with its request, `fail` fails with the request's `reason`
/// field, and `slow_echo` sleeps for `delay_ms` before echoing.
/// `echo_then_hang` echoes and then never returns; `echo_from_task` returns at
/// once and echoes from a spawned task after `delay_ms`.
pub fn test_module() -> FunctionTable {
    FunctionTable::new()
        .with("echo", |request, context: InvocationContext| async move {
            context.succeed(Value::Object(request));
        })
        .with("fail", |request: Request, context: InvocationContext| async move {
            let reason = request
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("failed")
                .to_string();
            context.fail(anyhow::anyhow!(reason));
        })
        .with("slow_echo", |request: Request, context: InvocationContext| async move {
            let delay_ms = request.get("delay_ms").and_then(Value::as_u64).unwrap_or(10);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            context.succeed(Value::Object(request));
        })
        .with("echo_then_hang", |request, context: InvocationContext| async move {
            context.succeed(Value::Object(request));
            std::future::pending::<()>().await;
        })
        .with("echo_from_task", |request: Request, context: InvocationContext| async move {
            let delay_ms = request.get("delay_ms").and_then(Value::as_u64).unwrap_or(10);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                context.succeed(Value::Object(request));
            });
        })
}

pub fn request(value: Value) -> Request {
    value.as_object().cloned().expect("request should be an object")
}

pub fn indexed_request(index: usize) -> Request {
    request(json!({ "index": index }))
}

/// Ordered record of harness-visible events, shared by thunks and callbacks.
#[derive(Debug, Default)]
pub struct EventLog {
    events: RefCell<Vec<String>>,
}

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.borrow().iter().any(|candidate| candidate == event)
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events
            .borrow()
            .iter()
            .position(|candidate| candidate == event)
    }
}
