//! Property-based tests for the composed market-data service.
//!
//! Run with: cargo test --test property_tests

#[path = "../support/mod.rs"]
pub mod support;

pub mod cache;
pub mod merge;
