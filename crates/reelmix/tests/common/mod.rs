//! Shared test utilities for reelmix integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Fake media tools written as POSIX shell scripts

pub mod harness;
pub mod tools;

pub use harness::TestHarness;
