//! Integration tests for the recording-tree store mapper.

mod lazy_series;
mod persistence;
mod references;
mod resync;
mod roundtrip;
pub mod test_utils;
