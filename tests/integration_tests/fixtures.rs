//! Test fixtures for integration tests
//!
//! Builds input directories of per-country record files in temp dirs.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use travel_monitor::config::{Config, WorkerConfig};

/// Greek records: one fresh vaccination, one stale, one unvaccinated
pub const GREECE_RECORDS: &[&str] = &[
    "1 Nikos Pappas Greece 40 COVID-19 YES 15-05-2021",
    "2 Eleni Pappa Greece 38 COVID-19 YES 10-01-2020",
    "3 Giorgos Dimou Greece 19 COVID-19 NO",
    "1 Nikos Pappas Greece 40 H1N1 NO",
];

pub const ITALY_RECORDS: &[&str] = &[
    "10 Anna Rossi Italy 33 COVID-19 YES 01-03-2021",
    "11 Marco Bianchi Italy 61 H1N1 YES 20-02-2021",
];

pub const SPAIN_RECORDS: &[&str] = &["20 Lucia Garcia Spain 25 COVID-19 NO"];

/// Write `lines` to `<root>/<country>/<file>`, creating the directory
pub fn write_records(root: &Path, country: &str, file: &str, lines: &[&str]) -> PathBuf {
    let dir = root.join(country);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(file);
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(&path, body).unwrap();
    path
}

/// Input directory with Greece, Italy and Spain
pub fn sample_input() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_records(temp.path(), "Greece", "Greece-1.txt", GREECE_RECORDS);
    write_records(temp.path(), "Italy", "Italy-1.txt", ITALY_RECORDS);
    write_records(temp.path(), "Spain", "Spain-1.txt", SPAIN_RECORDS);
    temp
}

/// Small, fast configuration rooted at `input` with logs under `logs`
pub fn test_config(input: &Path, logs: &Path) -> Config {
    let mut config = Config::default();
    config.coordinator.input_dir = input.to_path_buf();
    config.coordinator.log_dir = logs.to_path_buf();
    config.coordinator.num_workers = 2;
    config.transport.chunk_size = 16;
    config.import.filter_bytes = 1024;
    config.import.threads = 2;
    config.import.queue_capacity = 2;
    config
}

/// Worker configuration owning `countries` under `input`
pub fn worker_config(input: &Path, logs: &Path, countries: &[&str]) -> WorkerConfig {
    let dirs = countries.iter().map(|c| input.join(c)).collect();
    test_config(input, logs).worker_config(0, dirs)
}
