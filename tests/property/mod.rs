//! Property-based tests for the mapper's determinism guarantees.

mod determinism;
