//! Browser bridge.
//!
//! The browser side writes one JSON `HostEvent` per line on stdin and reads
//! one JSON `HostCommand` per line from stdout. Logs go to stderr so they
//! never interleave with commands.

use chrono::Utc;
use sitegate_core::{Config, Controller, HostEvent, Outcome};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};

use super::{open_store, CliResult};

/// Upper bound on an idle wait when nothing is scheduled.
const IDLE_WAIT: std::time::Duration = std::time::Duration::from_secs(60);

pub fn run(config: &Config) -> CliResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: &Config) -> CliResult {
    let store = open_store(config)?;
    let mut controller = Controller::new(store, &config.block_page.url, Utc::now())?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    tracing::info!("host bridge ready");

    loop {
        let wait = controller
            .next_deadline()
            .map_or(IDLE_WAIT, |at| (at - Utc::now()).to_std().unwrap_or_default());

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<HostEvent>(&line) {
                    Ok(event) => {
                        let outcome = controller.dispatch(event, Utc::now());
                        emit(&mut stdout, outcome).await?;
                    }
                    Err(e) => tracing::warn!(error = %e, "ignoring malformed host event"),
                }
            }
            () = tokio::time::sleep(wait) => {
                let outcome = controller.advance(Utc::now());
                emit(&mut stdout, outcome).await?;
            }
        }
    }

    tracing::info!("input closed, host bridge stopping");
    Ok(())
}

async fn emit(stdout: &mut Stdout, outcome: Outcome) -> CliResult {
    for event in &outcome.events {
        tracing::debug!(?event, "controller event");
    }
    if outcome.commands.is_empty() {
        return Ok(());
    }
    for command in &outcome.commands {
        let mut line = serde_json::to_vec(command)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
    }
    stdout.flush().await?;
    Ok(())
}
