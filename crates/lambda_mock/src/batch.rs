//! Series and parallel batches of invocations.
//!
//! Every call in a batch produces its request lazily, at the moment it is
//! dispatched, so a series call can depend on state left behind by the calls
//! before it. Once the invocation settles, the call's callback receives a
//! [`CallReport`] and a [`DoneSignal`]; the batch only moves on once that
//! signal fires. A callback that holds on to its signal forever stalls the
//! batch.

use std::fmt;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::InvocationError;
use crate::function::{FunctionTable, HandlerFn, Request};
use crate::invoker::LambdaMock;

type RequestThunk<'a> = Box<dyn FnOnce() -> Request + 'a>;
type CallCallback<'a> = Box<dyn FnOnce(CallReport, DoneSignal) + 'a>;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch call {index} failed: {source}")]
    Call {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("batch call {index} dropped its done signal")]
    DoneSignalDropped { index: usize },
}

impl BatchError {
    pub fn index(&self) -> usize {
        match self {
            Self::Call { index, .. } | Self::DoneSignalDropped { index } => *index,
        }
    }
}

/// What a single batch call reports back to its callback.
#[derive(Debug)]
pub struct CallReport {
    pub index: usize,
    pub function_name: String,
    /// The request exactly as produced by the thunk, before the harness copied it.
    pub request: Request,
    pub outcome: Result<Value, InvocationError>,
}

/// Lets a batch continue past one call. Consumed on use.
#[derive(Debug)]
pub struct DoneSignal {
    sender: oneshot::Sender<Result<(), anyhow::Error>>,
}

impl DoneSignal {
    fn new() -> (Self, oneshot::Receiver<Result<(), anyhow::Error>>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    pub fn done(self) {
        self.signal(Ok(()));
    }

    pub fn fail(self, error: impl Into<anyhow::Error>) {
        self.signal(Err(error.into()));
    }

    pub fn finish<E>(self, result: Result<(), E>)
    where
        E: Into<anyhow::Error>,
    {
        self.signal(result.map_err(Into::into));
    }

    fn signal(self, result: Result<(), anyhow::Error>) {
        // The receiver is gone only if the batch itself was dropped.
        let _ = self.sender.send(result);
    }
}

pub struct BatchCall<'a> {
    function_name: String,
    handler: HandlerFn,
    request: RequestThunk<'a>,
    callback: CallCallback<'a>,
}

impl<'a> BatchCall<'a> {
    /// Resolves `function_name` against `module` up front, so an unknown name
    /// fails while the batch is being assembled rather than mid-run.
    pub fn new<R, C>(
        module: &FunctionTable,
        function_name: impl Into<String>,
        request: R,
        callback: C,
    ) -> Result<Self, InvocationError>
    where
        R: FnOnce() -> Request + 'a,
        C: FnOnce(CallReport, DoneSignal) + 'a,
    {
        let function_name = function_name.into();
        let handler = module.resolve(&function_name)?;
        Ok(Self {
            function_name,
            handler,
            request: Box::new(request),
            callback: Box::new(callback),
        })
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }
}

impl fmt::Debug for BatchCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCall")
            .field("function_name", &self.function_name)
            .finish_non_exhaustive()
    }
}

impl LambdaMock {
    /// Runs `calls` one at a time, in order.
    ///
    /// Call N+1's request thunk is not evaluated until call N's done signal
    /// fires. The first failed signal stops the batch; later calls are never
    /// dispatched.
    pub async fn run_series(&self, calls: Vec<BatchCall<'_>>) -> Result<(), BatchError> {
        let total = calls.len();
        for (index, call) in calls.into_iter().enumerate() {
            if let Err(error) = self.run_call(index, call).await {
                warn!(
                    component = "lambda_mock",
                    event = "series_failed",
                    index,
                    skipped = total - index - 1,
                    error = %error,
                );
                return Err(error);
            }
        }
        Ok(())
    }

    /// Dispatches every call without waiting on the others.
    ///
    /// `on_settled` fires exactly once: with the first error as soon as it is
    /// signalled, or with `Ok(())` once every call has signalled done. Calls
    /// still in flight at that point are not cancelled; the returned future
    /// resolves only after all of them, and all of their callbacks, have run.
    pub async fn run_parallel<F>(&self, calls: Vec<BatchCall<'_>>, on_settled: F)
    where
        F: FnOnce(Result<(), BatchError>),
    {
        let mut in_flight: FuturesUnordered<_> = calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| self.run_call(index, call))
            .collect();
        let mut on_settled = Some(on_settled);

        while let Some(result) = in_flight.next().await {
            let Err(error) = result else {
                continue;
            };
            match on_settled.take() {
                Some(settle) => {
                    warn!(
                        component = "lambda_mock",
                        event = "parallel_failed",
                        index = error.index(),
                        in_flight = in_flight.len(),
                        error = %error,
                    );
                    settle(Err(error));
                }
                None => debug!(
                    component = "lambda_mock",
                    event = "parallel_error_after_settle",
                    index = error.index(),
                    error = %error,
                ),
            }
        }

        if let Some(settle) = on_settled {
            settle(Ok(()));
        }
    }

    async fn run_call(&self, index: usize, call: BatchCall<'_>) -> Result<(), BatchError> {
        let BatchCall {
            function_name,
            handler,
            request,
            callback,
        } = call;

        let request = request();
        let outcome = self.dispatch(&function_name, &handler, &request).await;

        let (done, signal) = DoneSignal::new();
        callback(
            CallReport {
                index,
                function_name,
                request,
                outcome,
            },
            done,
        );

        match signal.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(BatchError::Call { index, source }),
            Err(_) => Err(BatchError::DoneSignalDropped { index }),
        }
    }
}
