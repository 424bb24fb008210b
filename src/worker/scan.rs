//! Record file discovery
//!
//! Remembers every file already handed to the import pipeline so that a
//! rescan yields only files added since.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

/// Tracks which files of a worker's directories have been imported
#[derive(Debug, Clone, Default)]
pub struct FileTracker {
    directories: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl FileTracker {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            seen: HashSet::new(),
        }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Number of files returned so far
    pub fn known_files(&self) -> usize {
        self.seen.len()
    }

    /// Regular files not returned by an earlier call, sorted per directory
    pub async fn discover(&mut self) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for dir in &self.directories {
            let mut files = Vec::new();
            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    files.push(entry.path());
                }
            }
            files.sort();
            found.extend(files.into_iter().filter(|path| !self.seen.contains(path)));
        }
        self.seen.extend(found.iter().cloned());
        Ok(found)
    }
}
