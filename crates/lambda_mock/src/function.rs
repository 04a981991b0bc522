use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::context::InvocationContext;
use crate::error::InvocationError;

pub type Request = Map<String, Value>;

/// A registered function. It reports its result through the context's
/// completion entry points, not through the returned future.
pub type HandlerFn = Arc<dyn Fn(Request, InvocationContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// Name-to-function capability table standing in for a handler module.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: BTreeMap<String, HandlerFn>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(Request, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(
            move |request: Request, context: InvocationContext| -> BoxFuture<'static, ()> {
                Box::pin(function(request, context))
            },
        );
        self.functions.insert(name.into(), handler);
        self
    }

    pub fn with<F, Fut>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Request, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(name, function);
        self
    }

    pub fn resolve(&self, function_name: &str) -> Result<HandlerFn, InvocationError> {
        self.functions
            .get(function_name)
            .cloned()
            .ok_or_else(|| InvocationError::FunctionNotFound {
                function_name: function_name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("functions", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
