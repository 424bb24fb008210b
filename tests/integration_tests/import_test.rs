//! Import pipeline integration tests
//!
//! Record files on disk → bounded queue → consumer threads → worker store.

use tempfile::TempDir;

use travel_monitor::pipeline::{ImportError, ImportPipeline, PipelineConfig};
use travel_monitor::storage::{StoreSettings, WorkerStore};

use super::fixtures::{write_records, GREECE_RECORDS};

fn pipeline(threads: usize, queue_capacity: usize) -> ImportPipeline {
    let settings = StoreSettings {
        filter_bytes: 4096,
        ..StoreSettings::default()
    };
    ImportPipeline::new(
        PipelineConfig {
            threads,
            queue_capacity,
        },
        WorkerStore::new(settings),
    )
}

// ============================================================================
// Deduplication
// ============================================================================

#[test]
fn test_repeated_line_is_duplicate() {
    let temp = TempDir::new().unwrap();
    let line = "7 Maria Lopez Spain 30 COVID-19 YES 01-02-2021";
    let file = write_records(temp.path(), "Spain", "Spain-1.txt", &[line, line]);

    let pipeline = pipeline(2, 2);
    let stats = pipeline.run(vec![file]).unwrap();

    assert_eq!(stats.total_lines, 2);
    assert_eq!(stats.imported, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(pipeline.store().record_count(), 1);
}

#[test]
fn test_concurrent_import_deduplicates_across_files() {
    let temp = TempDir::new().unwrap();
    let shared: Vec<String> = (1..=50)
        .map(|id| format!("{id} Anna Rossi Italy 33 COVID-19 YES 01-03-2021"))
        .collect();

    let mut files = Vec::new();
    for n in 0..8 {
        let mut lines: Vec<String> = shared.clone();
        lines.push(format!("{} Marco Bianchi Italy 61 H1N1 NO", 1000 + n));
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        files.push(write_records(temp.path(), "Italy", &format!("Italy-{n}.txt"), &refs));
    }

    let pipeline = pipeline(4, 2);
    let stats = pipeline.run(files).unwrap();

    assert_eq!(stats.files, 8);
    assert_eq!(stats.total_lines, 8 * 51);
    assert_eq!(stats.imported, 50 + 8);
    assert_eq!(stats.duplicates, 7 * 50);
    assert_eq!(stats.inconsistent, 0);

    let store = pipeline.store();
    assert_eq!(store.record_count(), 58);
    assert_eq!(store.citizen_count(), 58);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_invalid_and_conflicting_lines_are_inconsistent() {
    let temp = TempDir::new().unwrap();
    let file = write_records(
        temp.path(),
        "Greece",
        "Greece-1.txt",
        &[
            "1 Nikos Pappas Greece 40 COVID-19 YES 15-05-2021",
            "1 Nikos Other Greece 40 H1N1 NO",
            "2 Eleni Pappa Greece 38 COVID-19 NO 10-01-2020",
            "3 Giorgos Dimou Greece 19 COVID-19 YES",
            "4 G1orgos Dimou Greece 19 COVID-19 NO",
            "x Eleni Pappa Greece 38 COVID-19 NO",
            "5 Eleni Pappa Greece",
        ],
    );

    let pipeline = pipeline(1, 1);
    let stats = pipeline.run(vec![file]).unwrap();

    assert_eq!(stats.imported, 1);
    assert_eq!(stats.inconsistent, 6);
    assert!(pipeline.store().citizen(1).is_some());
    assert!(pipeline.store().citizen(2).is_none());
}

#[test]
fn test_incremental_runs_accumulate_counters() {
    let temp = TempDir::new().unwrap();
    let first = write_records(temp.path(), "Greece", "Greece-1.txt", GREECE_RECORDS);
    let pipeline = pipeline(2, 1);
    pipeline.run(vec![first]).unwrap();

    let second = write_records(
        temp.path(),
        "Greece",
        "Greece-2.txt",
        &[
            "3 Giorgos Dimou Greece 19 COVID-19 NO",
            "4 Sofia Kosta Greece 70 H1N1 YES 02-02-2021",
        ],
    );
    let stats = pipeline.run(vec![second]).unwrap();

    assert_eq!(stats.files, 2);
    assert_eq!(stats.imported, 5);
    assert_eq!(stats.duplicates, 1);

    let store = pipeline.store();
    assert_eq!(store.virus_names(), vec!["COVID-19", "H1N1"]);
    let stat = store.stat("H1N1", "Greece").unwrap();
    assert_eq!(stat.total_registered(), 2);
    assert_eq!(stat.total_vaccinated(), 1);
}

#[test]
fn test_missing_file_aborts_run() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(2, 2);

    let err = pipeline
        .run(vec![temp.path().join("Nowhere").join("Nowhere-1.txt")])
        .unwrap_err();
    assert!(matches!(err, ImportError::Open { .. }));

    // The pipeline is reusable after an aborted run
    let file = write_records(temp.path(), "Spain", "Spain-1.txt", &["9 Lucia Garcia Spain 25 H1N1 NO"]);
    assert_eq!(pipeline.run(vec![file]).unwrap().imported, 1);
}

#[test]
fn test_undecodable_line_is_inconsistent() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("Greece");
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("Greece-1.txt");
    let mut body = b"1 Anna Rossi Greece 30 COVID-19 NO\n2 ".to_vec();
    body.extend_from_slice(&[0xff, 0xfe]);
    body.extend_from_slice(b" Rossi Greece 30 COVID-19 NO\n3 Marco Bianchi Greece 40 COVID-19 NO\n");
    std::fs::write(&file, body).unwrap();

    let pipeline = pipeline(2, 2);
    let stats = pipeline.run(vec![file]).unwrap();

    assert_eq!(stats.total_lines, 3);
    assert_eq!(stats.imported, 2);
    assert_eq!(stats.inconsistent, 1);
    assert!(pipeline.store().citizen(2).is_none());
}
