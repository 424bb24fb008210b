//! Worker integration tests
//!
//! Drives an in-process worker the way the coordinator does: handshake,
//! travel requests with verdicts, searches, updates and exit.

use std::fs;
use tempfile::TempDir;
use tokio::io::{duplex, DuplexStream};
use tokio::net::TcpStream;

use travel_monitor::coordinator::receive_handshake;
use travel_monitor::coordinator::spawn::{connect_worker, reserve_port};
use travel_monitor::protocol::{CitizenStatus, PacketChannel};
use travel_monitor::worker::{run_worker, Worker, WorkerState};

use super::fixtures::{sample_input, worker_config, write_records};

const CHUNK: usize = 16;

async fn started_worker(input: &TempDir, logs: &TempDir) -> Worker {
    let config = worker_config(input.path(), logs.path(), &["Greece", "Italy"]);
    let mut worker = Worker::new(config).with_pid(4242);
    worker.initialize().await.unwrap();
    worker
}

fn serve_in_background(mut worker: Worker) -> (PacketChannel<DuplexStream>, tokio::task::JoinHandle<Worker>) {
    let (coordinator_end, worker_end) = duplex(64 * 1024);
    let task = tokio::spawn(async move {
        let mut channel = PacketChannel::new(worker_end, CHUNK);
        worker.serve(&mut channel).await.unwrap();
        worker
    });
    (PacketChannel::new(coordinator_end, CHUNK), task)
}

async fn ask(channel: &mut PacketChannel<DuplexStream>, command: &str) -> String {
    channel.send_text(command).await.unwrap();
    channel.receive_text().await.unwrap()
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_handshake_reports_summary_and_filters() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let worker = started_worker(&input, &logs).await;
    let (mut channel, task) = serve_in_background(worker);

    let handshake = receive_handshake(&mut channel).await.unwrap();
    assert_eq!(handshake.summary.pid, 4242);
    assert_eq!(handshake.summary.imported, 6);
    assert_eq!(handshake.summary.total_lines, 6);
    assert_eq!(handshake.summary.virus_count, 2);

    let names: Vec<&str> = handshake.filters.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["COVID-19", "H1N1"]);
    assert!(handshake.filters.iter().all(|(_, bits)| bits.len() == 1024));

    drop(channel);
    let worker = task.await.unwrap();
    assert_eq!(worker.state(), WorkerState::Draining);
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_travel_requests_update_totals() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let worker = started_worker(&input, &logs).await;
    let (mut channel, task) = serve_in_background(worker);
    receive_handshake(&mut channel).await.unwrap();

    assert_eq!(ask(&mut channel, "REQUEST 1 COVID-19").await, "YES 15-05-2021");
    channel.send_text("ACCEPTED").await.unwrap();

    assert_eq!(ask(&mut channel, "REQUEST 999 COVID-19").await, "NO");
    channel.send_text("REJECTED").await.unwrap();

    assert_eq!(ask(&mut channel, "REQUEST 3 COVID-19").await, "NO");
    channel.send_text("REJECTED").await.unwrap();

    channel.send_text("EXIT").await.unwrap();
    let mut worker = task.await.unwrap();
    let totals = worker.totals();
    assert_eq!(totals.accepted, 1);
    assert_eq!(totals.rejected, 2);

    let path = worker.drain().await.unwrap();
    assert_eq!(path.file_name().unwrap(), "log_file.4242");
    let body = fs::read_to_string(path).unwrap();
    assert_eq!(
        body,
        "Greece\nItaly\nTOTAL TRAVEL REQUESTS 3\nACCEPTED 1\nREJECTED 2\n"
    );
}

#[tokio::test]
async fn test_search_status() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let worker = started_worker(&input, &logs).await;
    let (mut channel, task) = serve_in_background(worker);
    receive_handshake(&mut channel).await.unwrap();

    let reply = ask(&mut channel, "SEARCH 10").await;
    let status: CitizenStatus = reply.parse().unwrap();
    assert_eq!(status.first_name, "Anna");
    assert_eq!(status.country, "Italy");
    assert_eq!(status.age, 33);
    assert_eq!(status.vaccinations.len(), 2);
    assert_eq!(status.vaccinations[0].0, "COVID-19");
    assert!(status.vaccinations[0].1.is_some());
    assert_eq!(status.vaccinations[1], ("H1N1".to_string(), None));

    assert_eq!(ask(&mut channel, "SEARCH 555").await, "404");
    assert_eq!(ask(&mut channel, "DANCE").await, "404");

    channel.send_text("EXIT").await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_add_records() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let worker = started_worker(&input, &logs).await;
    let (mut channel, task) = serve_in_background(worker);
    receive_handshake(&mut channel).await.unwrap();

    assert_eq!(ask(&mut channel, "ADD_RECORDS").await, "404");

    write_records(
        input.path(),
        "Italy",
        "Italy-2.txt",
        &["12 Paolo Verdi Italy 45 SARS YES 05-05-2021"],
    );
    assert_eq!(ask(&mut channel, "ADD_RECORDS").await, "UPDATE");
    let update = receive_handshake(&mut channel).await.unwrap();
    assert_eq!(update.summary.imported, 7);
    assert_eq!(update.summary.virus_count, 3);
    assert_eq!(update.filters[2].0, "SARS");

    assert_eq!(ask(&mut channel, "REQUEST 12 SARS").await, "YES 05-05-2021");
    channel.send_text("ACCEPTED").await.unwrap();

    channel.send_text("EXIT").await.unwrap();
    let worker = task.await.unwrap();
    assert_eq!(worker.totals().accepted, 1);
}

// ============================================================================
// Worker Process Entry Point
// ============================================================================

#[tokio::test]
async fn test_run_worker_over_tcp() {
    let input = sample_input();
    let logs = TempDir::new().unwrap();
    let port = reserve_port().unwrap();
    let mut config = worker_config(input.path(), logs.path(), &["Spain"]);
    config.port = port;

    let worker = tokio::spawn(run_worker(config));

    let mut channel: PacketChannel<TcpStream> = connect_worker(port, CHUNK).await.unwrap();
    let handshake = receive_handshake(&mut channel).await.unwrap();
    assert_eq!(handshake.summary.imported, 1);
    assert_eq!(handshake.summary.pid, std::process::id());

    channel.send_text("EXIT").await.unwrap();
    worker.await.unwrap().unwrap();

    let log = logs.path().join(format!("log_file.{}", std::process::id()));
    let body = fs::read_to_string(log).unwrap();
    assert!(body.starts_with("Spain\nTOTAL TRAVEL REQUESTS 0\n"));
}
