//! Worker process
//!
//! A worker owns a subset of the country directories. It imports them
//! through the [`ImportPipeline`], reports its per-virus filters to the
//! coordinator, then answers commands until told to exit.
//!
//! # Lifecycle
//!
//! ```text
//! Initializing ──▶ Handshaking ──▶ Serving ──▶ Draining
//!  bind port        summary +       REQUEST       write log_file.<pid>
//!  scan + import    filters         ADD_RECORDS   exit 0
//!                                   SEARCH
//!                                   EXIT / EOF ──┘
//! ```

pub mod scan;

use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::pipeline::{ImportPipeline, ImportSnapshot};
use crate::protocol::message::{NOT_FOUND, UPDATE};
use crate::protocol::{Command, HandshakeSummary, PacketChannel, TravelReply, Verdict};
use crate::storage::{write_log_file, RequestTotals, WorkerStore};

pub use scan::FileTracker;

/// Phase of a worker's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Initializing,
    Handshaking,
    Serving,
    Draining,
}

/// State of one worker process
pub struct Worker {
    config: WorkerConfig,
    pid: u32,
    pipeline: ImportPipeline,
    tracker: FileTracker,
    totals: RequestTotals,
    state: WorkerState,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        let store = WorkerStore::new(config.import.store());
        let pipeline = ImportPipeline::new(config.import.pipeline(), store);
        let tracker = FileTracker::new(config.directories.clone());
        Self {
            config,
            pid: std::process::id(),
            pipeline,
            tracker,
            totals: RequestTotals::default(),
            state: WorkerState::Initializing,
        }
    }

    /// Override the reported process id
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn totals(&self) -> RequestTotals {
        self.totals
    }

    pub fn pipeline(&self) -> &ImportPipeline {
        &self.pipeline
    }

    /// Scan the assigned directories and import every file found
    pub async fn initialize(&mut self) -> Result<ImportSnapshot> {
        self.state = WorkerState::Initializing;
        self.import_new_files().await?;
        Ok(self.pipeline.stats())
    }

    /// Import files added since the last scan. Returns how many were found.
    pub async fn import_new_files(&mut self) -> Result<usize> {
        let files = self.tracker.discover().await?;
        if files.is_empty() {
            return Ok(0);
        }
        let count = files.len();
        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || pipeline.run(files))
            .await
            .map_err(|e| Error::with_source("import task failed", e))??;
        Ok(count)
    }

    /// Summary frame reported on handshake and after each update
    pub fn summary(&self) -> HandshakeSummary {
        let stats = self.pipeline.stats();
        HandshakeSummary {
            pid: self.pid,
            imported: stats.imported,
            inconsistent: stats.inconsistent,
            duplicates: stats.duplicates,
            total_lines: stats.total_lines,
            virus_count: self.pipeline.store().virus_count() as u32,
        }
    }

    /// Handshake, then answer commands until `EXIT` or disconnect
    pub async fn serve<S>(&mut self, channel: &mut PacketChannel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.state = WorkerState::Handshaking;
        self.send_summary(channel).await?;
        tracing::info!(pid = self.pid, "Handshake sent");

        self.state = WorkerState::Serving;
        loop {
            let text = match channel.receive_text().await {
                Ok(text) => text,
                Err(e) if e.is_disconnect() => {
                    tracing::info!(pid = self.pid, "Coordinator disconnected");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let command = match text.parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring malformed command");
                    channel.send_text(NOT_FOUND).await?;
                    continue;
                }
            };
            tracing::debug!(%command, "Received command");

            if command == Command::Shutdown {
                break;
            }
            self.handle(command, channel).await?;
        }

        self.state = WorkerState::Draining;
        Ok(())
    }

    async fn handle<S>(&mut self, command: Command, channel: &mut PacketChannel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match command {
            Command::TravelRequest { citizen_id, virus } => {
                let vaccinated_on = self.pipeline.store().vaccination_date(citizen_id, &virus);
                let reply = vaccinated_on.map_or(TravelReply::NotVaccinated, TravelReply::Vaccinated);
                channel.send_text(&reply.to_string()).await?;

                let verdict: Verdict = channel.receive_text().await?.parse()?;
                self.totals.record(verdict.is_accepted());
            }
            Command::AddRecords => {
                let files = self.tracker.discover().await?;
                if files.is_empty() {
                    channel.send_text(NOT_FOUND).await?;
                    return Ok(());
                }
                channel.send_text(UPDATE).await?;
                let pipeline = self.pipeline.clone();
                tokio::task::spawn_blocking(move || pipeline.run(files))
                    .await
                    .map_err(|e| Error::with_source("import task failed", e))??;
                self.send_summary(channel).await?;
            }
            Command::SearchStatus { citizen_id } => {
                let status = self.pipeline.store().citizen_status(citizen_id);
                let reply = status.map_or_else(|| NOT_FOUND.to_string(), |s| s.to_string());
                channel.send_text(&reply).await?;
            }
            Command::Shutdown => {}
        }
        Ok(())
    }

    async fn send_summary<S>(&self, channel: &mut PacketChannel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let summary = self.summary();
        let filters = self.pipeline.store().filters();
        channel.send_text(&summary.to_string()).await?;
        for (virus, bits) in filters {
            channel.send_text(&virus).await?;
            channel.send(&bits).await?;
        }
        Ok(())
    }

    /// Write `log_file.<pid>` with owned countries and request counters
    pub async fn drain(&mut self) -> Result<PathBuf> {
        self.state = WorkerState::Draining;
        let countries = self.config.country_names();
        let path = write_log_file(
            &self.config.log_dir,
            self.pid,
            countries.iter().map(String::as_str),
            self.totals,
        )
        .await?;
        Ok(path)
    }
}

/// Entry point of a spawned worker process
pub async fn run_worker(config: WorkerConfig) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
    let chunk_size = config.chunk_size;
    tracing::info!(
        port = config.port,
        directories = config.directories.len(),
        "Worker starting"
    );

    let mut worker = Worker::new(config);
    let stats = worker.initialize().await?;
    tracing::info!(
        imported = stats.imported,
        duplicates = stats.duplicates,
        inconsistent = stats.inconsistent,
        "Initial import complete"
    );

    let (stream, peer) = listener.accept().await?;
    drop(listener);
    stream.set_nodelay(true)?;
    tracing::info!(%peer, "Coordinator connected");
    let mut channel = PacketChannel::new(stream, chunk_size);

    let served = tokio::select! {
        result = worker.serve(&mut channel) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, draining");
            Ok(())
        }
    };

    worker.drain().await?;
    served
}
