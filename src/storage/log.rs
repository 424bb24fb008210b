//! Per-process summary log files
//!
//! Both roles write `log_file.<pid>` on shutdown:
//!
//! ```text
//! Albania
//! Greece
//! TOTAL TRAVEL REQUESTS 12
//! ACCEPTED 7
//! REJECTED 5
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Travel request counters reported in a log file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestTotals {
    pub accepted: u64,
    pub rejected: u64,
}

impl RequestTotals {
    pub fn total(&self) -> u64 {
        self.accepted + self.rejected
    }

    pub fn record(&mut self, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }
}

/// Path of the log file for process `pid`
pub fn log_file_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("log_file.{pid}"))
}

/// Render the log file body
pub fn render_log<'a>(countries: impl IntoIterator<Item = &'a str>, totals: RequestTotals) -> String {
    let mut out = String::new();
    for country in countries {
        out.push_str(country);
        out.push('\n');
    }
    let _ = writeln!(out, "TOTAL TRAVEL REQUESTS {}", totals.total());
    let _ = writeln!(out, "ACCEPTED {}", totals.accepted);
    let _ = writeln!(out, "REJECTED {}", totals.rejected);
    out
}

/// Write `log_file.<pid>` under `dir`, creating the directory if needed
pub async fn write_log_file<'a>(
    dir: &Path,
    pid: u32,
    countries: impl IntoIterator<Item = &'a str>,
    totals: RequestTotals,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = log_file_path(dir, pid);
    tokio::fs::write(&path, render_log(countries, totals)).await?;
    tracing::info!(path = %path.display(), total = totals.total(), "Wrote log file");
    Ok(path)
}
