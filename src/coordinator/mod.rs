//! Coordinator process
//!
//! The coordinator partitions the country directories across worker
//! processes, merges the filters they report, and answers interactive
//! queries by pre-screening against the merged filters and delegating exact
//! checks to the owning worker.
//!
//! # Architecture
//!
//! ```text
//!                     ┌────────────────────────────┐
//!  stdin ──/cmd──────▶│        Coordinator         │
//!                     │  VirusRegistry (merged)    │
//!                     │  RequestLog (per country)  │
//!                     └──────┬──────────┬──────────┘
//!               packets      │          │      packets
//!             ┌──────────────┘          └─────────────┐
//!             ▼                                       ▼
//!   ┌──────────────────┐                   ┌──────────────────┐
//!   │ Worker slot 0    │        ...        │ Worker slot n-1  │
//!   │ Albania, Denmark │                   │ Chile, France    │
//!   └──────────────────┘                   └──────────────────┘
//! ```
//!
//! Workers are driven strictly one exchange at a time. A worker found dead
//! before or during an exchange is replaced by a fresh process with the same
//! partition when reviving is enabled.

pub mod commands;
pub mod console;
pub mod distribution;
pub mod registry;
pub mod requests;
pub mod spawn;

use chrono::NaiveDate;
use futures::future::join_all;
use std::path::PathBuf;
use tokio::net::TcpStream;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{format_date, CitizenId, VirusId};
use crate::protocol::message::{NOT_FOUND, UPDATE};
use crate::protocol::{CitizenStatus, Command, PacketChannel, TravelReply, Verdict};
use crate::storage::write_log_file;
use crate::utils::format_bytes;

pub use commands::{QueryError, UserCommand, HELP_TEXT, PROMPT_HINT};
pub use console::run_console;
pub use distribution::{effective_worker_count, list_country_dirs, partition_round_robin};
pub use registry::{receive_handshake, Handshake, VirusRegistry, WorkerHandle, WorkerRegistry};
pub use requests::{RequestLog, TravelDecision, TravelRequestRecord};

/// Message printed after a successful `/addVaccinationRecords`
pub const DATABASE_UPDATED: &str = "THE DATABASE HAS BEEN UPDATED";

/// Coordinator state
pub struct Coordinator {
    config: Config,
    program: PathBuf,
    pid: u32,
    workers: WorkerRegistry,
    viruses: VirusRegistry,
    requests: RequestLog,
}

impl Coordinator {
    /// Partition the input directory, spawn and connect every worker, and
    /// merge their handshakes
    pub async fn start(config: Config) -> Result<Self> {
        let input_dir = config.coordinator.input_dir.clone();
        let dirs = list_country_dirs(&input_dir).await?;
        if dirs.is_empty() {
            return Err(Error::config(format!(
                "no country directories found in {}",
                input_dir.display()
            )));
        }

        let count = effective_worker_count(config.coordinator.num_workers, dirs.len(), &input_dir);
        let partitions = partition_round_robin(&dirs, count);
        let program = spawn::worker_program(&config)?;

        let mut coordinator = Self {
            viruses: VirusRegistry::new(config.import.hash_functions),
            config,
            program,
            pid: std::process::id(),
            workers: WorkerRegistry::default(),
            requests: RequestLog::new(),
        };

        let mut spawned = Vec::with_capacity(partitions.len());
        for (slot, directories) in partitions.into_iter().enumerate() {
            spawned.push(coordinator.spawn_slot(slot, directories)?);
        }

        let connected = coordinator.connect_all(&spawned).await;
        let channels = match connected {
            Ok(channels) => channels,
            Err(e) => {
                kill_all(&mut spawned).await;
                return Err(e);
            }
        };

        let mut handles = Vec::with_capacity(spawned.len());
        for (worker, channel) in spawned.into_iter().zip(channels) {
            handles.push(coordinator.handshake(worker, channel).await?);
        }
        coordinator.workers = WorkerRegistry::new(handles);

        tracing::info!(
            workers = coordinator.workers.len(),
            countries = dirs.len(),
            viruses = coordinator.viruses.len(),
            "Coordinator ready"
        );
        Ok(coordinator)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    pub fn viruses(&self) -> &VirusRegistry {
        &self.viruses
    }

    pub fn requests(&self) -> &RequestLog {
        &self.requests
    }

    // ========================================================================
    // Worker Lifecycle
    // ========================================================================

    fn spawn_slot(&self, slot: usize, directories: Vec<PathBuf>) -> Result<SpawnedWorker> {
        let port = spawn::reserve_port()?;
        let worker_config = self.config.worker_config(port, directories.clone());
        let child = spawn::spawn_worker(&self.program, &worker_config)?;
        Ok(SpawnedWorker {
            slot,
            port,
            directories,
            child,
        })
    }

    /// Connect to every spawned worker within the connect timeout
    async fn connect_all(&self, spawned: &[SpawnedWorker]) -> Result<Vec<PacketChannel<TcpStream>>> {
        let chunk_size = self.config.transport.chunk_size;
        let timeout = self.config.connect_timeout();
        let connect = async {
            let mut channels = Vec::with_capacity(spawned.len());
            for worker in spawned.iter() {
                channels.push(spawn::connect_worker(worker.port, chunk_size).await?);
            }
            Ok::<_, Error>(channels)
        };
        match tokio::time::timeout(timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectTimeout {
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn handshake(
        &mut self,
        worker: SpawnedWorker,
        mut channel: PacketChannel<TcpStream>,
    ) -> Result<WorkerHandle> {
        let handshake = receive_handshake(&mut channel).await?;
        let summary = handshake.summary;
        let filter_bytes: usize = handshake.filters.iter().map(|(_, bits)| bits.len()).sum();
        self.merge_filters(handshake.filters);
        tracing::info!(
            slot = worker.slot,
            pid = summary.pid,
            imported = summary.imported,
            duplicates = summary.duplicates,
            inconsistent = summary.inconsistent,
            total_lines = summary.total_lines,
            viruses = summary.virus_count,
            filters = %format_bytes(filter_bytes as u64),
            "Worker handshake"
        );

        Ok(WorkerHandle {
            slot: worker.slot,
            pid: summary.pid,
            port: worker.port,
            countries: registry::partition_countries(&worker.directories),
            directories: worker.directories,
            child: worker.child,
            channel,
        })
    }

    fn merge_filters(&mut self, filters: Vec<(String, Vec<u8>)>) {
        for (name, bits) in filters {
            self.viruses.merge(&name, bits);
        }
    }

    /// Replace the worker in `slot` with a fresh process owning the same
    /// partition
    pub async fn revive(&mut self, slot: usize) -> Result<u32> {
        let (old_pid, directories) = match self.workers.get_mut(slot) {
            Some(old) => {
                let _ = old.child.start_kill();
                if let Ok(status) = old.child.wait().await {
                    tracing::warn!(pid = old.pid, %status, "Worker exited");
                }
                (old.pid, old.directories.clone())
            }
            None => return Err(Error::worker(format!("no worker in slot {slot}"))),
        };

        let mut spawned = vec![self.spawn_slot(slot, directories)?];
        let mut channels = match self.connect_all(&spawned).await {
            Ok(channels) => channels,
            Err(e) => {
                kill_all(&mut spawned).await;
                return Err(e);
            }
        };
        let (Some(worker), Some(channel)) = (spawned.pop(), channels.pop()) else {
            return Err(Error::worker("revived worker vanished"));
        };
        let handle = self.handshake(worker, channel).await?;
        let new_pid = handle.pid;
        self.workers.replace(slot, handle);

        println!("Replacing worker {old_pid} with {new_pid}...");
        tracing::info!(slot, old_pid, new_pid, "Worker replaced");
        Ok(new_pid)
    }

    /// Revive the worker in `slot` if its process has exited
    async fn ensure_alive(&mut self, slot: usize) -> std::result::Result<(), QueryError> {
        let exited = self
            .workers
            .get_mut(slot)
            .map_or(true, WorkerHandle::has_exited);
        if !exited {
            return Ok(());
        }
        tracing::warn!(slot, "Worker is not running");
        self.recover(slot).await;
        match self.workers.get_mut(slot).map(WorkerHandle::has_exited) {
            Some(false) => Ok(()),
            _ => Err(QueryError::WorkerUnavailable),
        }
    }

    async fn recover(&mut self, slot: usize) {
        if !self.config.coordinator.revive_workers {
            return;
        }
        if let Err(e) = self.revive(slot).await {
            tracing::error!(slot, error = %e, "Failed to replace worker");
        }
    }

    /// Map an exchange failure to a user-visible error, reviving the worker
    async fn settle<T>(&mut self, slot: usize, result: Result<T>) -> std::result::Result<T, QueryError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(slot, error = %e, recoverable = e.is_recoverable(), "Worker exchange failed");
                self.recover(slot).await;
                Err(QueryError::WorkerUnavailable)
            }
        }
    }

    fn channel(&mut self, slot: usize) -> std::result::Result<&mut PacketChannel<TcpStream>, QueryError> {
        self.workers
            .get_mut(slot)
            .map(|w| &mut w.channel)
            .ok_or(QueryError::WorkerUnavailable)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Parse a console line. `/travelStats` reports missing data before
    /// its arguments are looked at.
    pub fn parse_command(&self, line: &str) -> Option<std::result::Result<UserCommand, QueryError>> {
        if line.split_whitespace().next() == Some("/travelStats") && self.requests.is_empty() {
            return Some(Err(QueryError::NoData));
        }
        UserCommand::parse(line)
    }

    /// Run one interactive command and return the text to print.
    /// `/exit` is handled by the caller through [`Coordinator::shutdown`].
    pub async fn execute(&mut self, command: UserCommand) -> std::result::Result<String, QueryError> {
        match command {
            UserCommand::TravelRequest {
                citizen_id,
                date,
                country_from,
                country_to,
                virus,
            } => {
                self.travel_request(citizen_id, date, &country_from, &country_to, &virus)
                    .await
            }
            UserCommand::TravelStats {
                virus,
                from,
                to,
                country,
            } => self.travel_stats(&virus, from, to, country.as_deref()),
            UserCommand::AddVaccinationRecords { country } => self.add_records(&country).await,
            UserCommand::SearchVaccinationStatus { citizen_id } => {
                self.search_status(citizen_id).await
            }
            UserCommand::Help => Ok(HELP_TEXT.to_string()),
            UserCommand::Exit => Ok(String::new()),
        }
    }

    pub async fn travel_request(
        &mut self,
        citizen_id: CitizenId,
        date: NaiveDate,
        country_from: &str,
        country_to: &str,
        virus: &str,
    ) -> std::result::Result<String, QueryError> {
        let slot = self
            .workers
            .owner_of(country_from)
            .ok_or(QueryError::NoSuchCountry)?;
        let virus_id = self.viruses.find(virus).ok_or(QueryError::NoSuchVirus)?;
        let maybe_vaccinated = self
            .viruses
            .get(virus_id)
            .is_some_and(|v| v.filter.check(citizen_id.to_string()));

        let decision = if maybe_vaccinated {
            self.ensure_alive(slot).await?;
            let result = travel_exchange(self.channel(slot)?, citizen_id, virus, date).await;
            self.settle(slot, result).await?
        } else {
            TravelDecision::NotVaccinated
        };

        tracing::debug!(citizen_id, virus, country_to, ?decision, "Travel request decided");
        self.requests.record(
            country_to,
            TravelRequestRecord {
                virus: VirusId(virus_id),
                accepted: decision.is_accepted(),
                date,
            },
        );
        Ok(decision.message().to_string())
    }

    pub fn travel_stats(
        &self,
        virus: &str,
        from: NaiveDate,
        to: NaiveDate,
        country: Option<&str>,
    ) -> std::result::Result<String, QueryError> {
        if self.requests.is_empty() {
            return Err(QueryError::NoData);
        }
        let virus_id = self.viruses.find(virus).ok_or(QueryError::NoSuchVirus)?;
        let countries: Vec<&str> = match country {
            Some(country) if !self.requests.contains(country) => {
                return Err(QueryError::NoDataForCountry)
            }
            Some(country) => vec![country],
            None => self.requests.countries().collect(),
        };

        let blocks: Vec<String> = countries
            .into_iter()
            .map(|country| {
                let totals = self.requests.stats(country, VirusId(virus_id), from, to);
                requests::render_stats(country, virus, totals)
            })
            .collect();
        Ok(blocks.join("\n\n"))
    }

    pub async fn add_records(&mut self, country: &str) -> std::result::Result<String, QueryError> {
        let slot = self
            .workers
            .owner_of(country)
            .ok_or(QueryError::NoSuchCountry)?;
        self.ensure_alive(slot).await?;
        let result = update_exchange(self.channel(slot)?).await;
        let handshake = self.settle(slot, result).await?.ok_or(QueryError::NoNewFiles)?;

        tracing::info!(
            slot,
            imported = handshake.summary.imported,
            duplicates = handshake.summary.duplicates,
            inconsistent = handshake.summary.inconsistent,
            "Worker updated"
        );
        self.merge_filters(handshake.filters);
        Ok(DATABASE_UPDATED.to_string())
    }

    pub async fn search_status(&mut self, citizen_id: CitizenId) -> std::result::Result<String, QueryError> {
        let mut found = Vec::new();
        for slot in 0..self.workers.len() {
            self.ensure_alive(slot).await?;
            let result = search_exchange(self.channel(slot)?, citizen_id).await;
            if let Some(status) = self.settle(slot, result).await? {
                found.push(render_status(&status));
            }
        }
        if found.is_empty() {
            return Err(QueryError::UserNotFound);
        }
        Ok(found.join("\n"))
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stop every worker, report exit statuses and write the coordinator log
    pub async fn shutdown(self) -> Result<PathBuf> {
        let countries = self.workers.all_countries();
        let totals = self.requests.totals();
        let mut handles = self.workers.into_handles();

        for worker in handles.iter_mut() {
            if let Err(e) = worker.channel.send_text(&Command::Shutdown.to_string()).await {
                tracing::warn!(pid = worker.pid, error = %e, "Failed to send exit command");
                let _ = worker.child.start_kill();
            }
        }

        let exits = join_all(handles.into_iter().map(|mut worker| async move {
            let status = worker.child.wait().await;
            (worker.pid, status)
        }))
        .await;

        for (pid, status) in exits {
            match status {
                Ok(status) => {
                    let code = status
                        .code()
                        .map_or_else(|| status.to_string(), |code| code.to_string());
                    println!("Exit status from {pid} was {code}");
                }
                Err(e) => tracing::error!(pid, error = %e, "Failed to wait for worker"),
            }
        }

        let log_dir = &self.config.coordinator.log_dir;
        let path = write_log_file(log_dir, self.pid, countries.iter().map(String::as_str), totals).await?;
        println!("log-files have been stored in {}", log_dir.display());
        Ok(path)
    }
}

/// A worker process that has been started but not yet connected
struct SpawnedWorker {
    slot: usize,
    port: u16,
    directories: Vec<PathBuf>,
    child: tokio::process::Child,
}

async fn kill_all(spawned: &mut [SpawnedWorker]) {
    for worker in spawned.iter_mut() {
        let _ = worker.child.start_kill();
        let _ = worker.child.wait().await;
    }
}

// ============================================================================
// Exchanges
// ============================================================================

async fn travel_exchange(
    channel: &mut PacketChannel<TcpStream>,
    citizen_id: CitizenId,
    virus: &str,
    date: NaiveDate,
) -> Result<TravelDecision> {
    let command = Command::TravelRequest {
        citizen_id,
        virus: virus.to_string(),
    };
    channel.send_text(&command.to_string()).await?;
    let reply: TravelReply = channel.receive_text().await?.parse()?;
    let vaccinated_on = match reply {
        TravelReply::Vaccinated(on) => Some(on),
        TravelReply::NotVaccinated => None,
    };

    let decision = TravelDecision::decide(vaccinated_on, date);
    let verdict = if decision.is_accepted() {
        Verdict::Accepted
    } else {
        Verdict::Rejected
    };
    channel.send_text(verdict.as_str()).await?;
    Ok(decision)
}

/// `None` when the worker found no new files
async fn update_exchange(channel: &mut PacketChannel<TcpStream>) -> Result<Option<Handshake>> {
    channel.send_text(&Command::AddRecords.to_string()).await?;
    let reply = channel.receive_text().await?;
    match reply.as_str() {
        NOT_FOUND => Ok(None),
        UPDATE => Ok(Some(receive_handshake(channel).await?)),
        other => Err(Error::worker(format!("unexpected update reply: {other}"))),
    }
}

async fn search_exchange(
    channel: &mut PacketChannel<TcpStream>,
    citizen_id: CitizenId,
) -> Result<Option<CitizenStatus>> {
    channel
        .send_text(&Command::SearchStatus { citizen_id }.to_string())
        .await?;
    let reply = channel.receive_text().await?;
    if reply == NOT_FOUND {
        return Ok(None);
    }
    Ok(Some(reply.parse()?))
}

/// Render a search result for the user
pub fn render_status(status: &CitizenStatus) -> String {
    let mut lines = vec![
        format!(
            "{} {} {} {}",
            status.citizen_id, status.first_name, status.last_name, status.country
        ),
        format!("AGE {}", status.age),
    ];
    for (virus, vaccinated_on) in &status.vaccinations {
        lines.push(match vaccinated_on {
            Some(date) => format!("{virus} VACCINATED ON {}", format_date(*date)),
            None => format!("{virus} NOT YET VACCINATED"),
        });
    }
    lines.join("\n")
}
