//! Worker handles and the merged virus registry
//!
//! The coordinator keeps one [`WorkerHandle`] per partition slot and one
//! [`GlobalVirus`] per virus name reported by any worker. Every handshake or
//! update merges the reporting worker's filters into the global view.

use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::process::Child;

use crate::index::MembershipFilter;
use crate::protocol::{HandshakeSummary, PacketChannel, ProtocolError};
use crate::storage::{Named, SortedRegistry};

use super::distribution::country_name;

// ============================================================================
// Worker Handles
// ============================================================================

/// A live worker process and its connection
#[derive(Debug)]
pub struct WorkerHandle {
    /// Partition index, stable across revivals
    pub slot: usize,
    pub pid: u32,
    pub port: u16,
    /// Owned country names, ascending
    pub countries: Vec<String>,
    pub directories: Vec<PathBuf>,
    pub child: Child,
    pub channel: PacketChannel<TcpStream>,
}

impl WorkerHandle {
    pub fn owns(&self, country: &str) -> bool {
        self.countries.iter().any(|c| c == country)
    }

    /// Whether the process has already exited
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }
}

/// Country names of a partition, ascending
pub fn partition_countries(directories: &[PathBuf]) -> Vec<String> {
    let mut countries: Vec<String> = directories.iter().map(|d| country_name(d)).collect();
    countries.sort();
    countries
}

/// Handles of all running workers, indexed by slot
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerHandle>,
}

impl WorkerRegistry {
    pub fn new(workers: Vec<WorkerHandle>) -> Self {
        Self { workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Slot of the worker owning `country`
    pub fn owner_of(&self, country: &str) -> Option<usize> {
        self.workers.iter().position(|w| w.owns(country))
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut WorkerHandle> {
        self.workers.get_mut(slot)
    }

    /// Put a revived worker in place of the old one, returning the old handle
    pub fn replace(&mut self, slot: usize, handle: WorkerHandle) -> Option<WorkerHandle> {
        self.workers
            .get_mut(slot)
            .map(|old| std::mem::replace(old, handle))
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.iter()
    }

    /// Every owned country across workers, ascending
    pub fn all_countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self
            .workers
            .iter()
            .flat_map(|w| w.countries.iter().cloned())
            .collect();
        countries.sort();
        countries
    }

    pub fn into_handles(self) -> Vec<WorkerHandle> {
        self.workers
    }
}

// ============================================================================
// Merged Filters
// ============================================================================

/// A virus known to the coordinator with its merged filter
#[derive(Debug, Clone)]
pub struct GlobalVirus {
    pub name: String,
    pub filter: MembershipFilter,
}

impl Named for GlobalVirus {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Union of every worker's per-virus filters
#[derive(Debug, Default)]
pub struct VirusRegistry {
    viruses: SortedRegistry<GlobalVirus>,
    hash_functions: usize,
}

impl VirusRegistry {
    pub fn new(hash_functions: usize) -> Self {
        Self {
            viruses: SortedRegistry::new(),
            hash_functions,
        }
    }

    /// Insert the filter for an unseen virus, else OR it into the existing one
    pub fn merge(&mut self, name: &str, bits: Vec<u8>) {
        let hash_functions = self.hash_functions;
        let mut incoming = Some(bits);
        let (id, created) = self.viruses.insert_if_absent(name, || GlobalVirus {
            name: name.to_string(),
            filter: MembershipFilter::from_bytes(incoming.take().unwrap_or_default(), hash_functions),
        });
        if !created {
            if let (Some(virus), Some(bits)) = (self.viruses.get_mut(id), incoming) {
                virus.filter.merge(&bits);
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.viruses.find(name)
    }

    pub fn get(&self, id: usize) -> Option<&GlobalVirus> {
        self.viruses.get(id)
    }

    pub fn len(&self) -> usize {
        self.viruses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viruses.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.viruses.names()
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Summary plus `(virus, filter bytes)` frames sent by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub summary: HandshakeSummary,
    pub filters: Vec<(String, Vec<u8>)>,
}

/// Receive a summary frame followed by one name and one filter frame per virus
pub async fn receive_handshake<S>(channel: &mut PacketChannel<S>) -> Result<Handshake, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let summary: HandshakeSummary = channel.receive_text().await?.parse()?;
    let mut filters = Vec::new();
    for _ in 0..summary.virus_count {
        let name = channel.receive_text().await?;
        let bits = channel.receive().await?;
        filters.push((name, bits));
    }
    Ok(Handshake { summary, filters })
}
