//! Observability infrastructure
//!
//! Structured logging through `tracing`. Every crate logs with `tracing`
//! macros; this module only installs the process-wide subscriber.

pub mod logging;

pub use logging::{build_filter_directives, init_tracing};
