//! Test-time simulator of a hosted function runtime.
//!
//! A [`LambdaMock`] invokes functions registered in a [`FunctionTable`] the
//! way the hosted runtime would: each call gets a private copy of its request
//! and a fresh [`InvocationContext`] whose completion entry points settle the
//! call exactly once. Batches of calls run either in strict series or
//! concurrently on the caller's task; see [`batch`].

pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod function;
pub mod invoker;

pub use batch::{BatchCall, BatchError, CallReport, DoneSignal};
pub use config::LambdaMockConfig;
pub use context::{Completion, InvocationContext, Settlement};
pub use error::InvocationError;
pub use function::{FunctionTable, HandlerFn, Request};
pub use invoker::LambdaMock;
