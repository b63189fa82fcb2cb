//! # Design
//!
//! - Classify pipeline failures so the orchestrator can decide between restart, error state and silence.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::error::Error;
use std::io;

use popcorn_core::StreamError;
use thiserror::Error;

/// Result alias for a single load attempt.
pub type LoadResult<T> = Result<T, LoadError>;

/// Outcome classification of a failed load attempt.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The stream could not be prepared; the stored request is replayed.
    #[error("torrent stream preparation failed")]
    Restart {
        /// Source stream error.
        source: StreamError,
    },
    /// The attempt cannot continue and ends in the error state.
    #[error("load attempt failed")]
    Fatal {
        /// Pipeline stage that failed.
        stage: &'static str,
        /// Source collaborator error.
        source: Box<dyn Error + Send + Sync>,
    },
    /// The attempt was cancelled or superseded; nothing is reported.
    #[error("load attempt cancelled")]
    Cancelled,
}

impl LoadError {
    pub(crate) fn fatal(stage: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        Self::Fatal {
            stage,
            source: Box::new(source),
        }
    }

    /// Classify a stream start failure.
    pub(crate) fn from_stream(source: StreamError) -> Self {
        match source {
            StreamError::PrepareFailed { .. } => Self::Restart { source },
            other => Self::fatal("start_stream", other),
        }
    }
}

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: popcorn_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: popcorn_telemetry::TelemetryError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Backend address involved in the failure.
        address: Option<String>,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: popcorn_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: popcorn_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }
}
