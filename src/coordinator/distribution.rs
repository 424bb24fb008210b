//! Country directory distribution
//!
//! Country sub-directories of the input directory are dealt round-robin to
//! workers: country `i` in ascending name order goes to worker `i mod n`.

use std::io;
use std::path::{Path, PathBuf};

// ============================================================================
// Discovery
// ============================================================================

/// Sub-directories of `input_dir`, sorted by name
pub async fn list_country_dirs(input_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut entries = tokio::fs::read_dir(input_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Clamp the requested worker count to the number of country directories
pub fn effective_worker_count(requested: usize, available: usize, input_dir: &Path) -> usize {
    if requested > available {
        tracing::warn!(requested, available, "Reducing worker count");
        println!(
            "Had to reduce the number of workers to {available} because of insufficient number of sub-directories in {}",
            input_dir.display()
        );
        available
    } else {
        requested
    }
}

// ============================================================================
// Partitioning
// ============================================================================

/// Deal `dirs` round-robin into `workers` partitions
pub fn partition_round_robin(dirs: &[PathBuf], workers: usize) -> Vec<Vec<PathBuf>> {
    let mut partitions = vec![Vec::new(); workers];
    if workers == 0 {
        return partitions;
    }
    for (i, dir) in dirs.iter().enumerate() {
        partitions[i % workers].push(dir.clone());
    }
    partitions
}

/// Directory name of a country path
pub fn country_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
