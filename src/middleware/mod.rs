//! HTTP middleware: request logging with latency tracking.

pub mod logging;

pub use logging::request_logging;
