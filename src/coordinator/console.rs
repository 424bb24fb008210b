//! Interactive command loop
//!
//! Reads commands line by line until `/exit`, end of input, a read error or
//! Ctrl-C, then shuts the coordinator down.

use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::commands::{UserCommand, PROMPT_HINT};
use super::Coordinator;
use crate::error::Result;

/// Serve commands from `input` and shut down when it ends.
/// Returns the coordinator log file path.
pub async fn run_console<R>(mut coordinator: Coordinator, input: R) -> Result<PathBuf>
where
    R: AsyncBufRead + Unpin,
{
    println!(
        "Travel monitor ready with {} workers and {} viruses",
        coordinator.workers().len(),
        coordinator.viruses().len()
    );

    let mut lines = input.lines();
    loop {
        println!("{PROMPT_HINT}");
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read command input");
                    None
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = match coordinator.parse_command(&line) {
            None => continue,
            Some(Err(e)) => {
                println!("{e}");
                continue;
            }
            Some(Ok(UserCommand::Exit)) => break,
            Some(Ok(command)) => command,
        };
        match coordinator.execute(command).await {
            Ok(output) => println!("{output}"),
            Err(e) => println!("{e}"),
        }
    }

    let path = coordinator.shutdown().await?;
    println!("Travel monitor stopped");
    Ok(path)
}
