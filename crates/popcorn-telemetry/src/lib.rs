#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Logging primitives shared across the workspace.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (application span
//! and load-attempt context), `error.rs`.

pub mod context;
pub mod error;
pub mod init;

pub use context::{AttemptContext, GlobalContextGuard, current_attempt, with_attempt_context};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
