//! Worker record storage
//!
//! This module holds the in-memory state of one worker's shard and the
//! summary log files written on shutdown.
//!
//! - [`WorkerStore`] - countries, viruses, citizens and statistics
//! - [`SortedRegistry`] - name-ordered registry with stable ids
//! - [`log`] - `log_file.<pid>` rendering and writing

pub mod log;
pub mod registry;
pub mod store;

pub use log::{write_log_file, RequestTotals};
pub use registry::{Named, SortedRegistry};
pub use store::{Country, InsertOutcome, StoreSettings, Virus, WorkerStore};
