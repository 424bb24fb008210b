//! Worker process spawning and connection
//!
//! Each worker gets an ephemeral loopback port chosen by the coordinator
//! (bind to port 0, read it back, release) and its full [`WorkerConfig`] as a
//! single JSON argument:
//!
//! ```text
//! travel-monitor worker --config '{"port":40123,"chunk_size":64,...}'
//! ```
//!
//! The coordinator then connects, retrying refused connections with
//! exponential backoff until the worker has finished its initial import and
//! started listening.

use std::io;
use std::net::TcpListener as StdTcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::config::{Config, WorkerConfig};
use crate::error::{Error, Result};
use crate::protocol::PacketChannel;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Reserve a free loopback port for a worker
pub fn reserve_port() -> io::Result<u16> {
    let listener = StdTcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Executable to start for workers: the configured program or this binary
pub fn worker_program(config: &Config) -> Result<PathBuf> {
    match &config.coordinator.worker_program {
        Some(program) => Ok(program.clone()),
        None => std::env::current_exe()
            .map_err(|e| Error::with_source("Failed to locate the running executable", e)),
    }
}

/// Start one worker process
pub fn spawn_worker(program: &Path, config: &WorkerConfig) -> Result<Child> {
    let arg = config.to_arg()?;
    let mut command = Command::new(program);
    command
        .arg("worker")
        .arg("--config")
        .arg(arg)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    // Keep terminal interrupts away from workers; the coordinator stops them.
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|source| Error::Spawn {
        program: program.display().to_string(),
        source,
    })?;
    tracing::debug!(
        pid = child.id(),
        port = config.port,
        directories = config.directories.len(),
        "Spawned worker"
    );
    Ok(child)
}

/// Connect to a worker, retrying while its port refuses connections
pub async fn connect_worker(port: u16, chunk_size: usize) -> Result<PacketChannel<TcpStream>> {
    let retry = RetryConfig::worker_connect();
    let stream = with_retry_if(
        &retry,
        || TcpStream::connect(("127.0.0.1", port)),
        |e: &io::Error| e.kind() == io::ErrorKind::ConnectionRefused,
    )
    .await
    .map_err(|source| Error::Connect { port, source })?;
    stream.set_nodelay(true)?;
    Ok(PacketChannel::new(stream, chunk_size))
}
