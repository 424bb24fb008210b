//! Concurrent bulk-import pipeline
//!
//! One producer enqueues file paths into a [`BoundedQueue`]; a pool of OS
//! threads pops paths and imports them line by line into the shared
//! [`WorkerStore`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  paths   ┌──────────────┐  pop   ┌──────────────┐
//! │ Producer │ ───────▶ │ BoundedQueue │ ─────▶ │  Consumer ×N │
//! └──────────┘          └──────────────┘        └──────┬───────┘
//!                                                      │ parse (unlocked)
//!                                                      ▼
//!                                      ┌───────────────────────────────┐
//!                                      │ Mutex<WorkerStore> (insert)   │
//!                                      └───────────────────────────────┘
//! ```
//!
//! Parsing runs outside the store lock; dedup and insertion run under it, so
//! duplicate detection is exact regardless of thread interleaving. The same
//! pipeline serves the initial import and every later incremental run;
//! counters accumulate across runs.

pub mod queue;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::models::RecordLine;
use crate::storage::{InsertOutcome, WorkerStore};

pub use queue::BoundedQueue;

// ============================================================================
// Configuration
// ============================================================================

/// Import pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of consumer threads
    pub threads: usize,

    /// Capacity of the path queue
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            queue_capacity: 10,
        }
    }
}

/// Errors that abort an import run
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("import thread panicked")]
    ConsumerPanicked,
}

// ============================================================================
// Statistics
// ============================================================================

/// Import counters (thread-safe, cumulative across runs)
#[derive(Debug, Default)]
pub struct ImportStats {
    /// Non-blank lines read
    pub total_lines: AtomicU64,

    /// Records accepted into the store
    pub imported: AtomicU64,

    /// Records already present
    pub duplicates: AtomicU64,

    /// Malformed or identity-conflicting records
    pub inconsistent: AtomicU64,

    /// Files fully imported
    pub files: AtomicU64,
}

impl ImportStats {
    /// Get snapshot of current stats
    pub fn snapshot(&self) -> ImportSnapshot {
        ImportSnapshot {
            total_lines: self.total_lines.load(Ordering::Relaxed),
            imported: self.imported.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            inconsistent: self.inconsistent.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of import statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSnapshot {
    pub total_lines: u64,
    pub imported: u64,
    pub duplicates: u64,
    pub inconsistent: u64,
    pub files: u64,
}

// ============================================================================
// Pipeline Implementation
// ============================================================================

/// Reusable producer/consumer importer bound to one store
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    config: PipelineConfig,
    store: Arc<Mutex<WorkerStore>>,
    queue: Arc<BoundedQueue<PathBuf>>,
    stats: Arc<ImportStats>,
}

impl ImportPipeline {
    pub fn new(config: PipelineConfig, store: WorkerStore) -> Self {
        Self {
            config,
            store: Arc::new(Mutex::new(store)),
            queue: Arc::new(BoundedQueue::new(config.queue_capacity)),
            stats: Arc::new(ImportStats::default()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Lock the store for a query
    pub fn store(&self) -> MutexGuard<'_, WorkerStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> ImportSnapshot {
        self.stats.snapshot()
    }

    /// Import `files` and block until every consumer has finished
    pub fn run(&self, files: Vec<PathBuf>) -> Result<ImportSnapshot, ImportError> {
        let threads = self.config.threads.max(1);
        tracing::info!(files = files.len(), threads, "Starting import run");
        self.queue.rearm();

        let result = std::thread::scope(|scope| {
            let consumers: Vec<_> = (0..threads)
                .map(|_| scope.spawn(|| self.consume()))
                .collect();

            for path in files {
                if self.queue.push(path).is_err() {
                    break;
                }
            }
            self.queue.finish();

            let mut first_error = None;
            for consumer in consumers {
                let outcome = consumer.join().unwrap_or(Err(ImportError::ConsumerPanicked));
                if let Err(e) = outcome {
                    first_error.get_or_insert(e);
                }
            }
            first_error.map_or(Ok(()), Err)
        });

        let snapshot = self.stats.snapshot();
        match result {
            Ok(()) => {
                tracing::info!(
                    total_lines = snapshot.total_lines,
                    imported = snapshot.imported,
                    duplicates = snapshot.duplicates,
                    inconsistent = snapshot.inconsistent,
                    "Import run finished"
                );
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!(error = %e, "Import run aborted");
                Err(e)
            }
        }
    }

    fn consume(&self) -> Result<(), ImportError> {
        while let Some(path) = self.queue.pop() {
            if let Err(e) = self.import_file(&path) {
                self.queue.close();
                return Err(e);
            }
        }
        Ok(())
    }

    fn import_file(&self, path: &Path) -> Result<(), ImportError> {
        let file = File::open(path).map_err(|source| ImportError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| ImportError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => self.import_line(line.trim_end_matches(['\n', '\r'])),
                Err(e) => {
                    self.stats.total_lines.fetch_add(1, Ordering::Relaxed);
                    self.stats.inconsistent.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(path = %path.display(), error = %e, "Undecodable record");
                }
            }
        }

        self.stats.files.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %path.display(), "Imported file");
        Ok(())
    }

    fn import_line(&self, line: &str) {
        self.stats.total_lines.fetch_add(1, Ordering::Relaxed);

        let record = match RecordLine::parse(line) {
            Ok(record) => record,
            Err(e) => {
                self.stats.inconsistent.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(line, error = %e, "Inconsistent record");
                return;
            }
        };

        let outcome = self.store().insert(&record);
        match outcome {
            InsertOutcome::Imported => {
                self.stats.imported.fetch_add(1, Ordering::Relaxed);
            }
            InsertOutcome::Duplicate => {
                self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(line, "Duplicate record");
            }
            InsertOutcome::Inconsistent(e) => {
                self.stats.inconsistent.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(line, error = %e, "Inconsistent record");
            }
        }
    }
}
