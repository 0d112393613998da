//! Utility functions and helpers.

pub mod sql_text;

pub use sql_text::SqlText;
