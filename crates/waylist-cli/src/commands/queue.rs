use chrono::Utc;
use waylist_core::Session;

use crate::commands::common::{format_outcome_lines, format_queue_lines};
use crate::error::CliError;

pub async fn run_queue(session: &Session, as_json: bool) -> Result<(), CliError> {
    let operations = session.queue().snapshot().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&operations)?);
    } else if operations.is_empty() {
        println!("Nothing waiting to be sent.");
    } else {
        for line in format_queue_lines(&operations, Utc::now()) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_flush(session: &Session) -> Result<(), CliError> {
    let before = session.queue().snapshot().await;
    if before.is_empty() {
        println!("Nothing waiting to be sent.");
        return Ok(());
    }

    let outcomes = session.queue().run_until_blocked().await?;
    for line in format_outcome_lines(&outcomes, &before) {
        println!("{line}");
    }

    let remaining = session.queue().len().await;
    if remaining > 0 {
        println!("{remaining} operation(s) still pending.");
    }
    Ok(())
}
