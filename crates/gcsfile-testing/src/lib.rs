//! Testing utilities and fixtures for gcsfile
//!
//! This crate provides in-memory bucket helpers, object store wrappers that
//! reshape or break downloads and uploads, and data fixtures for testing
//! code built on gcsfile without network access.

pub mod fixtures;
pub mod helpers;
pub mod stores;

pub use fixtures::{sample_bytes, text_lines};
pub use helpers::{init_tracing, read_object, seed_object};
pub use stores::{FaultyStore, FragmentingStore};

/// Project identifier used throughout the test suites
pub const TEST_PROJECT: &str = "test-project";

/// Bucket name used throughout the test suites
pub const TEST_BUCKET: &str = "test-bucket";
