use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LambdaMockConfig;
use crate::error::InvocationError;

pub const LOG_GROUP_PREFIX: &str = "/aws/lambda/";
pub const LOG_STREAM_PLACEHOLDER: &str = "2015/09/10/[HEAD]1234";
pub const FUNCTION_VERSION: &str = "HEAD";

type SettledOutcome = Result<Value, anyhow::Error>;

/// Single-use result sink shared by `done`, `succeed`, and `fail`.
///
/// The first settlement wins. Every later attempt is ignored, logged at
/// `warn`, and reported to the caller as `false`.
#[derive(Debug)]
pub struct Completion {
    aws_request_id: String,
    sender: Mutex<Option<oneshot::Sender<SettledOutcome>>>,
}

impl Completion {
    fn new(aws_request_id: String) -> (Self, oneshot::Receiver<SettledOutcome>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                aws_request_id,
                sender: Mutex::new(Some(sender)),
            },
            receiver,
        )
    }

    pub fn done<E>(&self, outcome: Result<Value, E>) -> bool
    where
        E: Into<anyhow::Error>,
    {
        self.settle(outcome.map_err(Into::into))
    }

    pub fn succeed(&self, result: impl Into<Value>) -> bool {
        self.settle(Ok(result.into()))
    }

    pub fn fail(&self, error: impl Into<anyhow::Error>) -> bool {
        self.settle(Err(error.into()))
    }

    pub fn is_settled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn settle(&self, outcome: SettledOutcome) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(sender) = sender else {
            warn!(
                component = "lambda_mock",
                event = "completion_ignored",
                aws_request_id = %self.aws_request_id,
                succeeded = outcome.is_ok(),
                "invocation already completed"
            );
            return false;
        };

        if sender.send(outcome).is_err() {
            debug!(
                component = "lambda_mock",
                event = "completion_unobserved",
                aws_request_id = %self.aws_request_id,
            );
        }
        true
    }
}

/// Receiving half of a call's [`Completion`].
#[derive(Debug)]
pub struct Settlement {
    function_name: String,
    receiver: oneshot::Receiver<SettledOutcome>,
}

impl Settlement {
    pub async fn wait(self) -> Result<Value, InvocationError> {
        let Settlement {
            function_name,
            receiver,
        } = self;

        match receiver.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(InvocationError::Function(error)),
            Err(_) => Err(InvocationError::Abandoned { function_name }),
        }
    }
}

/// Per-call execution context handed to the invoked function.
///
/// The function name and log group are carried here rather than in process
/// environment variables, so concurrently dispatched calls never observe each
/// other's values.
#[derive(Debug)]
pub struct InvocationContext {
    pub aws_request_id: String,
    pub invoke_id: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub function_name: String,
    pub memory_limit_in_mb: u32,
    pub function_version: String,
    pub is_default_function_version: bool,
    pub region: String,
    pub timeout: Duration,
    started_at: Instant,
    completion: Completion,
}

impl InvocationContext {
    pub(crate) fn new(config: &LambdaMockConfig, function_name: &str) -> (Self, Settlement) {
        let aws_request_id = Uuid::new_v4().to_string();
        let (completion, receiver) = Completion::new(aws_request_id.clone());

        let context = Self {
            aws_request_id,
            invoke_id: Uuid::new_v4().to_string(),
            log_group_name: format!("{LOG_GROUP_PREFIX}{function_name}"),
            log_stream_name: LOG_STREAM_PLACEHOLDER.to_string(),
            function_name: function_name.to_string(),
            memory_limit_in_mb: config.memory_size_mb,
            function_version: FUNCTION_VERSION.to_string(),
            is_default_function_version: true,
            region: config.region.clone(),
            timeout: config.timeout,
            started_at: Instant::now(),
            completion,
        };
        let settlement = Settlement {
            function_name: function_name.to_string(),
            receiver,
        };
        (context, settlement)
    }

    /// Time since the context was created, measured on every call.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining_time(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    pub fn done<E>(&self, outcome: Result<Value, E>) -> bool
    where
        E: Into<anyhow::Error>,
    {
        self.completion.done(outcome)
    }

    pub fn succeed(&self, result: impl Into<Value>) -> bool {
        self.completion.succeed(result)
    }

    pub fn fail(&self, error: impl Into<anyhow::Error>) -> bool {
        self.completion.fail(error)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;

    fn context(function_name: &str) -> (InvocationContext, Settlement) {
        InvocationContext::new(&LambdaMockConfig::default(), function_name)
    }

    #[test]
    fn derives_names_from_function() {
        let (context, _settlement) = context("cats");

        assert_eq!(context.function_name, "cats");
        assert_eq!(context.log_group_name, "/aws/lambda/cats");
        assert_eq!(context.log_stream_name, "2015/09/10/[HEAD]1234");
        assert_eq!(context.function_version, "HEAD");
        assert!(context.is_default_function_version);
        assert_eq!(context.memory_limit_in_mb, 128);
        assert_eq!(context.region, "us-test-1");
    }

    #[test]
    fn identifiers_are_unique_per_call() {
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let (context, _settlement) = context("cats");
            assert_ne!(context.aws_request_id, context.invoke_id);
            assert!(seen.insert(context.aws_request_id.clone()));
            assert!(seen.insert(context.invoke_id.clone()));
        }
    }

    #[test]
    fn elapsed_is_measured_on_every_access() {
        let (context, _settlement) = context("cats");
        let delay = Duration::from_millis(20);

        let first = context.elapsed();
        std::thread::sleep(delay);
        let second = context.elapsed();

        assert!(second - first >= delay);
        assert!(context.remaining_time() <= context.timeout - delay);
    }

    #[tokio::test]
    async fn first_settlement_wins() {
        let (context, settlement) = context("cats");

        assert!(context.succeed(json!({"a": 1})));
        assert!(!context.fail(anyhow::anyhow!("late failure")));
        assert!(!context.done(Ok::<_, anyhow::Error>(json!("late"))));
        assert!(context.completion().is_settled());

        let value = settlement.wait().await.expect("first settlement should win");
        assert_eq!(value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn done_with_error_surfaces_function_error() {
        let (context, settlement) = context("cats");
        context.done(Err::<Value, _>(anyhow::anyhow!("table missing")));

        let error = settlement.wait().await.expect_err("call should fail");
        assert_eq!(error.to_string(), "table missing");
        assert!(error.function_error().is_some());
    }

    #[tokio::test]
    async fn dropping_unsettled_context_is_abandoned() {
        let (context, settlement) = context("cats");
        drop(context);

        let error = settlement.wait().await.expect_err("call should be abandoned");
        assert!(matches!(
            error,
            InvocationError::Abandoned { ref function_name } if function_name == "cats"
        ));
    }
}
