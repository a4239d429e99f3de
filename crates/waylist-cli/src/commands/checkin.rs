use waylist_core::models::Checklist;
use waylist_core::Session;

use crate::commands::common::flush_after_enqueue;
use crate::error::CliError;

/// Queue a check-in or check-out; the mirror shows it right away.
pub async fn run_set_visited(
    session: &Session,
    list: Checklist,
    item_id: i64,
    visited: bool,
    offline: bool,
) -> Result<(), CliError> {
    if session.mirror().place(list, item_id)?.is_none() {
        return Err(CliError::PlaceNotFound(list.key().to_string(), item_id));
    }

    let operation = session.set_visited(list, item_id, visited).await?;
    println!("{}", operation.title);
    flush_after_enqueue(session, offline).await
}
