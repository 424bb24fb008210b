//! Unified error handling for the travel-monitor crate
//!
//! This module provides a unified error type that consolidates all
//! domain-specific errors into a single `Error` enum, while keeping the
//! domain-specific errors available where they are raised.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//! - [`Error::exit_code`] - Distinct process exit code per category
//!
//! # Usage
//!
//! ```rust,ignore
//! use travel_monitor::error::Error;
//!
//! fn handle_error(err: Error) -> i32 {
//!     if err.is_recoverable() {
//!         tracing::warn!(error = %err, "Worker lost, reviving");
//!     }
//!     err.exit_code()
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::coordinator::QueryError;
pub use crate::models::RecordError;
pub use crate::pipeline::ImportError;
pub use crate::protocol::ProtocolError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Framing, socket and peer-disconnect errors
    Transport,
    /// Record file import errors
    Import,
    /// Child process spawn, connect and lifecycle errors
    Process,
    /// Configuration and validation errors
    Config,
    /// Local file system errors
    Storage,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Process exit code reported for a fatal error of this category
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Other => 1,
            Self::Config => 2,
            Self::Import => 3,
            Self::Transport => 4,
            Self::Process => 5,
            Self::Storage => 6,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Transport => "transport error",
            Self::Import => "import error",
            Self::Process => "process error",
            Self::Config => "configuration error",
            Self::Storage => "storage error",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the travel-monitor crate
#[derive(Error, Debug)]
pub enum Error {
    /// Packet framing or message errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Bulk import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// A worker process could not be started
    #[error("Failed to spawn worker {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A worker could not be reached on its port
    #[error("Failed to connect to worker on port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Workers did not accept connections in time
    #[error("Workers did not accept connections within {secs}s")]
    ConnectTimeout { secs: u64 },

    /// A worker misbehaved or exited
    #[error("Worker error: {0}")]
    Worker(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (the worker can be replaced)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Protocol(e) => e.is_disconnect(),
            Self::Connect { source, .. } => source.kind() == io::ErrorKind::ConnectionRefused,
            Self::Worker(_) => true,
            Self::Io(_) => true,
            Self::Import(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Spawn { .. }
            | Self::ConnectTimeout { .. }
            | Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Protocol(_) => ErrorCategory::Transport,
            Self::Import(_) => ErrorCategory::Import,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) | Self::Config(_) => ErrorCategory::Config,
            Self::Spawn { .. }
            | Self::Connect { .. }
            | Self::ConnectTimeout { .. }
            | Self::Worker(_) => ErrorCategory::Process,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a worker error
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
