//! Deterministic, pure logic shared by the grader.
//!
//! Core modules are free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod gtest;
pub mod report;
pub mod scorecard;
pub mod types;
