//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `topicsub` crate.
//!
//! It centralizes the error type returned by fallible broker operations and
//! the logging bootstrap used by the demo binary and tests.

pub mod error;
pub mod logging;

pub use error::BrokerError;
