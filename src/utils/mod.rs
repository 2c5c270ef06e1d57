//! The `utils` module provides the error type and logging setup shared
//! across the `jmqt` crate.

pub mod error;
pub mod logging;
