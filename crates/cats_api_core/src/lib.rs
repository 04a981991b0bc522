//! Document-store CRUD primitives for the cats API.
//!
//! This crate owns the operation contract, the handler dispatcher, and the
//! backend trait the dispatcher forwards to. It intentionally excludes the AWS
//! SDK and Lambda runtime concerns, which live in `cats_api_lambda`.

pub mod backend;
pub mod contract;
pub mod dispatch;
#[cfg(feature = "test-helpers")]
mod expression;
#[cfg(feature = "test-helpers")]
pub mod memory;
