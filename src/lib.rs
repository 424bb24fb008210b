//! travel-monitor - Partitioned vaccination-record service
//!
//! A coordinator process splits a directory of per-country record files
//! across worker processes. Each worker bulk-imports its countries into an
//! in-memory store and reports per-virus membership filters; the coordinator
//! merges them and answers travel, statistics and search queries.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and the typed worker config
//! - [`coordinator`] - Partitioning, worker lifecycle and query routing
//! - [`worker`] - Worker process: import, handshake and command serving
//! - [`pipeline`] - Bounded-queue multi-threaded file import
//! - [`storage`] - Worker store, name registries and log files
//! - [`index`] - Membership filter, skip list and chained hash table
//! - [`protocol`] - Packet framing and wire messages
//! - [`models`] - Record lines, citizens and statistics
//! - [`utils`] - Retry with backoff and helpers
//!
//! # Example
//!
//! ```no_run
//! use travel_monitor::config::Config;
//! use travel_monitor::coordinator::{run_console, Coordinator};
//!
//! #[tokio::main]
//! async fn main() -> travel_monitor::error::Result<()> {
//!     let config = Config::from_env()?;
//!     let coordinator = Coordinator::start(config).await?;
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!     run_console(coordinator, stdin).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod protocol;
pub mod storage;
pub mod utils;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, WorkerConfig};
    pub use crate::coordinator::{Coordinator, QueryError, UserCommand};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{CitizenId, RecordLine, VaccinationStatus};
    pub use crate::pipeline::ImportPipeline;
    pub use crate::storage::WorkerStore;
    pub use crate::worker::Worker;
}

// Direct re-exports for convenience
pub use models::{CitizenId, RecordLine};
