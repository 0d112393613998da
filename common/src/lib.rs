//! Shared building blocks for the spatial query service.
//!
//! - `config`: environment driven configuration
//! - `errors`: the application error type and its HTTP mapping
//! - `middleware`: request tracing middleware
//! - `models`: spatial response models
//! - `response`: HTTP error body
//! - `utils`: SQL text helpers

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
