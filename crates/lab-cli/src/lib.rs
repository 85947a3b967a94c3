//! Library components for the `labflow` CLI.

pub mod logging;
pub mod scenario;
