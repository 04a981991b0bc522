use std::time::Instant;

use futures::future::{self, Either};
use serde_json::Value;
use tracing::debug;

use crate::config::LambdaMockConfig;
use crate::context::{InvocationContext, Settlement};
use crate::error::InvocationError;
use crate::function::{FunctionTable, HandlerFn, Request};

/// Invokes registered functions the way a hosted runtime would.
///
/// The harness holds only read-only defaults, so one instance can serve any
/// number of concurrently dispatched calls.
#[derive(Debug, Clone, Default)]
pub struct LambdaMock {
    config: LambdaMockConfig,
}

impl LambdaMock {
    pub fn new(config: LambdaMockConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LambdaMockConfig {
        &self.config
    }

    pub fn new_context(&self, function_name: &str) -> (InvocationContext, Settlement) {
        InvocationContext::new(&self.config, function_name)
    }

    /// Runs `function_name` from `module` against a private copy of `request`.
    ///
    /// Resolves as soon as the function settles its context, even if the
    /// function's own future is still running. Lookup failures return before
    /// anything is dispatched. Panics raised before settlement are not caught;
    /// the unfinished remainder of a settled function runs as a detached tokio
    /// task, so panics after settlement land on the runtime instead.
    pub async fn invoke(
        &self,
        module: &FunctionTable,
        function_name: &str,
        request: &Request,
    ) -> Result<Value, InvocationError> {
        let handler = module.resolve(function_name)?;
        self.dispatch(function_name, &handler, request).await
    }

    pub(crate) async fn dispatch(
        &self,
        function_name: &str,
        handler: &HandlerFn,
        request: &Request,
    ) -> Result<Value, InvocationError> {
        let request_copy = request.clone();
        let (context, settlement) = self.new_context(function_name);
        let aws_request_id = context.aws_request_id.clone();
        let started_at = Instant::now();

        debug!(
            component = "lambda_mock",
            event = "invocation_started",
            function_name,
            aws_request_id = %aws_request_id,
        );

        let function = handler(request_copy, context);
        let outcome = match future::select(function, Box::pin(settlement.wait())).await {
            Either::Left(((), settlement)) => settlement.await,
            Either::Right((outcome, function)) => {
                debug!(
                    component = "lambda_mock",
                    event = "function_outlived_completion",
                    function_name,
                    aws_request_id = %aws_request_id,
                );
                tokio::spawn(function);
                outcome
            }
        };

        debug!(
            component = "lambda_mock",
            event = "invocation_completed",
            function_name,
            aws_request_id = %aws_request_id,
            duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            succeeded = outcome.is_ok(),
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::{sleep, timeout};

    use super::*;

    #[derive(Debug)]
    struct TableMissing;

    impl fmt::Display for TableMissing {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("table missing")
        }
    }

    impl std::error::Error for TableMissing {}

    fn request(value: Value) -> Request {
        value.as_object().cloned().expect("request should be an object")
    }

    fn module() -> FunctionTable {
        FunctionTable::new()
            .with("echo", |request, context: InvocationContext| async move {
                context.succeed(Value::Object(request));
            })
            .with("mutate", |mut request: Request, context: InvocationContext| async move {
                request.insert("mutated".to_string(), json!(true));
                if let Some(Value::Object(nested)) = request.get_mut("nested") {
                    nested.insert("touched".to_string(), json!(true));
                }
                context.succeed(Value::Object(request));
            })
            .with("context", |_request, context: InvocationContext| async move {
                let details = json!({
                    "function_name": context.function_name.clone(),
                    "log_group_name": context.log_group_name.clone(),
                    "memory_limit_in_mb": context.memory_limit_in_mb,
                    "region": context.region.clone(),
                });
                context.succeed(details);
            })
            .with("fail", |_request, context: InvocationContext| async move {
                context.fail(TableMissing);
            })
            .with("forget", |_request, _context| async {})
            .with("settle_then_linger", |_request, context: InvocationContext| async move {
                context.succeed("settled");
                sleep(Duration::from_millis(300)).await;
            })
            .with("settle_then_hang", |_request, context: InvocationContext| async move {
                context.succeed("settled");
                std::future::pending::<()>().await;
            })
            .with("settle_from_task", |_request, context: InvocationContext| async move {
                tokio::spawn(async move {
                    sleep(Duration::from_millis(10)).await;
                    context.succeed("late");
                });
            })
            .with("panic", |_request, _context: InvocationContext| async move {
                panic!("boom");
            })
    }

    #[tokio::test]
    async fn echo_returns_request_fields() {
        let mock = LambdaMock::default();
        let original = request(json!({"a": 1, "b": {"c": [1, 2]}}));

        let result = mock
            .invoke(&module(), "echo", &original)
            .await
            .expect("echo should succeed");

        assert_eq!(result, Value::Object(original));
    }

    #[tokio::test]
    async fn function_mutations_never_reach_caller_request() {
        let mock = LambdaMock::default();
        let original = request(json!({"a": 1, "nested": {"b": 2}}));
        let snapshot = original.clone();

        let result = mock
            .invoke(&module(), "mutate", &original)
            .await
            .expect("mutate should succeed");

        assert_eq!(original, snapshot);
        assert_eq!(result["mutated"], json!(true));
        assert_eq!(result["nested"]["touched"], json!(true));
    }

    #[tokio::test]
    async fn context_reflects_harness_config() {
        let mock = LambdaMock::new(LambdaMockConfig {
            region: "eu-test-2".to_string(),
            memory_size_mb: 256,
            ..LambdaMockConfig::default()
        });

        let result = mock
            .invoke(&module(), "context", &Request::new())
            .await
            .expect("context should succeed");

        assert_eq!(
            result,
            json!({
                "function_name": "context",
                "log_group_name": "/aws/lambda/context",
                "memory_limit_in_mb": 256,
                "region": "eu-test-2",
            })
        );
    }

    #[tokio::test]
    async fn missing_function_fails_before_dispatch() {
        let mock = LambdaMock::default();
        let error = mock
            .invoke(&module(), "cats", &Request::new())
            .await
            .expect_err("unknown function should fail");

        assert!(matches!(error, InvocationError::FunctionNotFound { .. }));
    }

    #[tokio::test]
    async fn function_error_is_propagated_verbatim() {
        let mock = LambdaMock::default();
        let error = mock
            .invoke(&module(), "fail", &Request::new())
            .await
            .expect_err("fail should fail");

        assert_eq!(error.to_string(), "table missing");
        let source = error.function_error().expect("function error");
        assert!(source.downcast_ref::<TableMissing>().is_some());
    }

    #[tokio::test]
    async fn returning_without_completion_is_abandoned() {
        let mock = LambdaMock::default();
        let error = mock
            .invoke(&module(), "forget", &Request::new())
            .await
            .expect_err("forget should not complete");

        assert!(matches!(error, InvocationError::Abandoned { .. }));
    }

    #[tokio::test]
    async fn resolves_at_completion_not_when_function_returns() {
        let mock = LambdaMock::default();
        let started_at = Instant::now();

        let result = mock
            .invoke(&module(), "settle_then_linger", &Request::new())
            .await
            .expect("settled call should succeed");

        assert_eq!(result, json!("settled"));
        assert!(started_at.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn completed_call_does_not_wait_on_a_stuck_function() {
        let mock = LambdaMock::default();
        let module = module();

        let result = timeout(
            Duration::from_millis(500),
            mock.invoke(&module, "settle_then_hang", &Request::new()),
        )
        .await
        .expect("invoke should not hang after completion")
        .expect("settled call should succeed");

        assert_eq!(result, json!("settled"));
    }

    #[tokio::test]
    async fn completion_from_spawned_task_resolves_call() {
        let mock = LambdaMock::default();
        let result = mock
            .invoke(&module(), "settle_from_task", &Request::new())
            .await
            .expect("late completion should succeed");

        assert_eq!(result, json!("late"));
    }

    #[tokio::test]
    async fn work_after_completion_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let module = FunctionTable::new().with(
            "tail",
            move |_request, context: InvocationContext| {
                let flag = Arc::clone(&flag);
                async move {
                    context.succeed("settled");
                    sleep(Duration::from_millis(20)).await;
                    flag.store(true, Ordering::SeqCst);
                }
            },
        );

        LambdaMock::default()
            .invoke(&module, "tail", &Request::new())
            .await
            .expect("tail should succeed");
        assert!(!finished.load(Ordering::SeqCst));

        sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    #[should_panic(expected = "boom")]
    async fn panics_propagate_to_caller() {
        let mock = LambdaMock::default();
        let _ = mock.invoke(&module(), "panic", &Request::new()).await;
    }
}
