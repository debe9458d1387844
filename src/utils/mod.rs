//! Utils Module
pub mod telemetry;

pub use telemetry::{init_test_tracing, init_tracing};
