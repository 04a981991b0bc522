//! AWS-oriented adapters and handlers for the cats API.
//!
//! This crate owns runtime integration details (the Lambda handler, the
//! DynamoDB document backend, and environment configuration). Operation
//! semantics live in `cats_api_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
