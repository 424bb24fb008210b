//! Coordinator integration tests
//!
//! These start real worker processes from the crate's own binary.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

use travel_monitor::config::Config;
use travel_monitor::coordinator::{run_console, Coordinator, QueryError, UserCommand};
use travel_monitor::error::Error;

use super::fixtures::{sample_input, test_config};

const BINARY: &str = env!("CARGO_BIN_EXE_travel-monitor");

fn coordinator_config(input: &Path, logs: &Path) -> Config {
    let mut config = test_config(input, logs);
    config.coordinator.worker_program = Some(PathBuf::from(BINARY));
    config
}

async fn run(coordinator: &mut Coordinator, line: &str) -> Result<String, QueryError> {
    let command = UserCommand::parse(line).unwrap()?;
    coordinator.execute(command).await
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_worker_count_clamped_to_country_directories() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let mut config = coordinator_config(input.path(), logs.path());
    config.coordinator.num_workers = 5;

    let coordinator = Coordinator::start(config).await.unwrap();

    let workers = coordinator.workers();
    assert_eq!(workers.len(), 3);
    for worker in workers.iter() {
        assert_eq!(worker.countries.len(), 1);
    }
    assert_eq!(workers.all_countries(), vec!["Greece", "Italy", "Spain"]);
    assert_eq!(coordinator.viruses().names().collect::<Vec<_>>(), vec!["COVID-19", "H1N1"]);

    coordinator.shutdown().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_connect_timeout_aborts_startup() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let mut config = test_config(input.path(), logs.path());
    config.coordinator.worker_program = Some(PathBuf::from("/bin/sh"));
    config.coordinator.connect_timeout_secs = 1;

    let err = Coordinator::start(config).await.err().unwrap();
    assert!(matches!(err, Error::ConnectTimeout { secs: 1 }));
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_travel_requests_and_statistics() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let mut coordinator = Coordinator::start(coordinator_config(input.path(), logs.path()))
        .await
        .unwrap();

    assert_eq!(
        run(&mut coordinator, "/travelStats COVID-19 01-01-2021 31-12-2021").await,
        Err(QueryError::NoData)
    );
    assert_eq!(
        coordinator.parse_command("/travelStats COVID-19").unwrap().err(),
        Some(QueryError::NoData)
    );

    // Unknown citizen
    assert_eq!(
        run(&mut coordinator, "/travelRequest 999 01-06-2021 Greece Italy COVID-19").await.unwrap(),
        "REQUEST REJECTED - YOU ARE NOT VACCINATED"
    );
    // Vaccinated on 10-01-2020, long before travel
    assert_eq!(
        run(&mut coordinator, "/travelRequest 2 01-06-2021 Greece Italy COVID-19").await.unwrap(),
        "REQUEST REJECTED - YOU WILL NEED ANOTHER VACCINATION BEFORE TRAVEL DATE"
    );
    assert_eq!(
        run(&mut coordinator, "/travelRequest 1 01-06-2021 Greece Spain COVID-19").await.unwrap(),
        "REQUEST ACCEPTED - HAPPY TRAVELS"
    );
    // Travel before the vaccination date
    assert_eq!(
        run(&mut coordinator, "/travelRequest 1 01-05-2021 Greece Spain COVID-19").await.unwrap(),
        "REQUEST REJECTED - YOU ARE NOT VACCINATED"
    );

    assert_eq!(
        run(&mut coordinator, "/travelRequest 1 01-06-2021 Narnia Spain COVID-19").await,
        Err(QueryError::NoSuchCountry)
    );
    assert_eq!(
        run(&mut coordinator, "/travelRequest 1 01-06-2021 Greece Spain EBOLA").await,
        Err(QueryError::NoSuchVirus)
    );

    assert_eq!(
        run(&mut coordinator, "/travelStats COVID-19 01-01-2021 31-12-2021 Italy").await.unwrap(),
        "Italy STATISTICS COVID-19\nTOTAL REQUESTS 2\nACCEPTED 0\nREJECTED 2"
    );
    assert_eq!(
        run(&mut coordinator, "/travelStats COVID-19 01-01-2021 31-12-2021").await.unwrap(),
        "Italy STATISTICS COVID-19\nTOTAL REQUESTS 2\nACCEPTED 0\nREJECTED 2\n\n\
         Spain STATISTICS COVID-19\nTOTAL REQUESTS 2\nACCEPTED 1\nREJECTED 1"
    );
    assert_eq!(
        run(&mut coordinator, "/travelStats COVID-19 01-07-2021 31-12-2021 Spain").await.unwrap(),
        "Spain STATISTICS COVID-19\nTOTAL REQUESTS 0\nACCEPTED 0\nREJECTED 0"
    );
    assert_eq!(
        run(&mut coordinator, "/travelStats COVID-19 01-01-2021 31-12-2021 France").await,
        Err(QueryError::NoDataForCountry)
    );
    assert_eq!(
        run(&mut coordinator, "/travelStats SARS 01-01-2021 31-12-2021").await,
        Err(QueryError::NoSuchVirus)
    );
    assert_eq!(
        coordinator.parse_command("/travelStats COVID-19").unwrap().err(),
        Some(QueryError::ArgumentCount)
    );

    let log = coordinator.shutdown().await.unwrap();
    let body = fs::read_to_string(log).unwrap();
    assert_eq!(
        body,
        "Greece\nItaly\nSpain\nTOTAL TRAVEL REQUESTS 4\nACCEPTED 1\nREJECTED 3\n"
    );
}

#[tokio::test]
async fn test_search_and_add_records() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let mut coordinator = Coordinator::start(coordinator_config(input.path(), logs.path()))
        .await
        .unwrap();

    assert_eq!(
        run(&mut coordinator, "/searchVaccinationStatus 10").await.unwrap(),
        "10 Anna Rossi Italy\nAGE 33\nCOVID-19 VACCINATED ON 01-03-2021\nH1N1 NOT YET VACCINATED"
    );
    assert_eq!(
        run(&mut coordinator, "/searchVaccinationStatus 777").await,
        Err(QueryError::UserNotFound)
    );

    assert_eq!(
        run(&mut coordinator, "/addVaccinationRecords Spain").await,
        Err(QueryError::NoNewFiles)
    );
    assert_eq!(
        run(&mut coordinator, "/addVaccinationRecords Narnia").await,
        Err(QueryError::NoSuchCountry)
    );

    super::fixtures::write_records(
        input.path(),
        "Spain",
        "Spain-2.txt",
        &["21 Pablo Ruiz Spain 52 SARS YES 20-05-2021"],
    );
    assert_eq!(
        run(&mut coordinator, "/addVaccinationRecords Spain").await.unwrap(),
        "THE DATABASE HAS BEEN UPDATED"
    );
    assert!(coordinator.viruses().find("SARS").is_some());
    assert_eq!(
        run(&mut coordinator, "/travelRequest 21 01-06-2021 Spain Greece SARS").await.unwrap(),
        "REQUEST ACCEPTED - HAPPY TRAVELS"
    );

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_revive_keeps_partition() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let mut coordinator = Coordinator::start(coordinator_config(input.path(), logs.path()))
        .await
        .unwrap();

    let slot = coordinator.workers().owner_of("Greece").unwrap();
    let old_pid = coordinator.workers().iter().nth(slot).unwrap().pid;

    let new_pid = coordinator.revive(slot).await.unwrap();

    assert_ne!(new_pid, old_pid);
    assert_eq!(coordinator.workers().owner_of("Greece"), Some(slot));
    assert_eq!(
        run(&mut coordinator, "/travelRequest 1 01-06-2021 Greece Spain COVID-19").await.unwrap(),
        "REQUEST ACCEPTED - HAPPY TRAVELS"
    );

    coordinator.shutdown().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_dead_worker_replaced_on_next_query() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let mut coordinator = Coordinator::start(coordinator_config(input.path(), logs.path()))
        .await
        .unwrap();

    let slot = coordinator.workers().owner_of("Greece").unwrap();
    let old_pid = coordinator.workers().iter().nth(slot).unwrap().pid;

    let status = Command::new("kill")
        .args(["-9", &old_pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    assert_eq!(
        run(&mut coordinator, "/travelRequest 1 01-06-2021 Greece Spain COVID-19").await.unwrap(),
        "REQUEST ACCEPTED - HAPPY TRAVELS"
    );

    let new_pid = coordinator.workers().iter().nth(slot).unwrap().pid;
    assert_ne!(new_pid, old_pid);
    assert_eq!(coordinator.workers().owner_of("Greece"), Some(slot));

    coordinator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_console_read_error_still_shuts_down() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let coordinator = Coordinator::start(coordinator_config(input.path(), logs.path()))
        .await
        .unwrap();

    let stdin = tokio_test::io::Builder::new()
        .read(b"/travelRequest 1 01-06-2021 Greece Spain COVID-19\n")
        .read_error(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad input"))
        .build();
    let log = run_console(coordinator, tokio::io::BufReader::new(stdin)).await.unwrap();

    let body = fs::read_to_string(log).unwrap();
    assert!(body.ends_with("TOTAL TRAVEL REQUESTS 1\nACCEPTED 1\nREJECTED 0\n"));
    assert_eq!(fs::read_dir(logs.path()).unwrap().count(), 3);
}

// ============================================================================
// Binary End-to-End
// ============================================================================

#[test]
fn test_interactive_session() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();

    let mut child = Command::new(BINARY)
        .arg("coordinator")
        .args(["-m", "5", "-b", "16", "-s", "1024", "-t", "2", "-c", "2"])
        .arg("-i")
        .arg(input.path())
        .arg("--log-dir")
        .arg(logs.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let script = "\
/travelRequest 999 01-06-2021 Greece Italy COVID-19
/travelRequest 2 01-06-2021 Greece Italy COVID-19
/travelRequest 1 01-06-2021 Greece Spain COVID-19
/travelRequest 1 01-06-2021 Greece
/nonsense
/help
/exit
";
    child.stdin.take().unwrap().write_all(script.as_bytes()).unwrap();

    let mut output = String::new();
    child.stdout.take().unwrap().read_to_string(&mut output).unwrap();
    let status = child.wait().unwrap();
    assert!(status.success());

    assert!(output.contains(
        "Had to reduce the number of workers to 3 because of insufficient number of sub-directories"
    ));
    assert!(output.contains("REQUEST REJECTED - YOU ARE NOT VACCINATED"));
    assert!(output.contains("REQUEST REJECTED - YOU WILL NEED ANOTHER VACCINATION BEFORE TRAVEL DATE"));
    assert!(output.contains("REQUEST ACCEPTED - HAPPY TRAVELS"));
    assert!(output.contains("INVALID NUMBER OF ARGUMENTS"));
    assert!(output.contains("/searchVaccinationStatus citizenID"));
    assert_eq!(output.matches("Exit status from").count(), 3);
    assert_eq!(output.matches("Exit status from").count(), output.matches(" was 0").count());

    let log_files = fs::read_dir(logs.path()).unwrap().count();
    assert_eq!(log_files, 4);
}
